//! Standard relief program catalog.

pub mod common;
pub mod currently_not_collectible;
pub mod innocent_spouse;
pub mod installment_agreement;
pub mod offer_in_compromise;
pub mod penalty_abatement;

use std::collections::BTreeSet;

use crate::eligibility::heuristics::Heuristics;
use crate::errors::StateViolation;
use crate::workflow::definition::ProgramDefinition;
use crate::workflow::engine::WorkflowEngine;

/// Program definitions in declaration order. The order is the tie-breaker
/// for eligibility ranking.
#[derive(Clone, Debug)]
pub struct ProgramCatalog {
    programs: Vec<ProgramDefinition>,
}

impl ProgramCatalog {
    pub fn new(programs: Vec<ProgramDefinition>) -> Self {
        Self { programs }
    }

    pub fn standard() -> Self {
        Self::from_heuristics(&Heuristics::default())
    }

    pub fn from_heuristics(heuristics: &Heuristics) -> Self {
        Self::new(vec![
            installment_agreement::definition(heuristics),
            offer_in_compromise::definition(heuristics),
            currently_not_collectible::definition(heuristics),
            penalty_abatement::definition(heuristics),
            innocent_spouse::definition(heuristics),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramDefinition> {
        self.programs.iter()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ProgramDefinition> {
        self.programs.iter().find(|program| program.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&ProgramDefinition, StateViolation> {
        self.get(id).ok_or_else(|| StateViolation::UnknownProgram(id.to_string()))
    }

    pub fn engine_for(&self, id: &str) -> Result<WorkflowEngine<'_>, StateViolation> {
        self.require(id).map(WorkflowEngine::new)
    }

    pub fn check_integrity(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        let mut ids = BTreeSet::new();
        for program in &self.programs {
            if !ids.insert(program.id) {
                problems.push(format!("duplicate program id `{}`", program.id));
            }
            if let Err(mut program_problems) = program.check_integrity() {
                problems.append(&mut program_problems);
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
