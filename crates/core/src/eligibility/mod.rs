pub mod heuristics;
pub mod rule;

use std::sync::Arc;

use serde::Serialize;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::profile::{Profile, ProfileFacts};
use crate::domain::program::{DisplayMetrics, ProgramId, ProgramResult};
use crate::programs::ProgramCatalog;
use crate::workflow::definition::ProgramDefinition;

pub use heuristics::Heuristics;
pub use rule::{Assessment, ConfidenceRule, Disqualification, EligibilityRule};

pub trait EligibilityEngine: Send + Sync {
    /// Ranked results for every applicable program. Total over any profile.
    fn evaluate(&self, profile: &Profile) -> Vec<ProgramResult>;

    fn evaluate_with_audit<S>(
        &self,
        profile: &Profile,
        sink: &S,
        audit: &AuditContext,
    ) -> Vec<ProgramResult>
    where
        S: AuditSink,
        Self: Sized,
    {
        let results = self.evaluate(profile);
        let qualified: Vec<&str> =
            results.iter().filter(|result| result.qualified).map(|result| result.id.as_str()).collect();
        sink.emit(
            AuditEvent::new(audit, "eligibility.evaluated", AuditCategory::Eligibility, AuditOutcome::Success)
                .with_metadata("evaluated", results.len().to_string())
                .with_metadata("qualified", qualified.join(",")),
        );
        results
    }
}

/// Catalog-driven engine. Holds no mutable state, so one instance can serve
/// any number of concurrent evaluations.
#[derive(Clone, Debug)]
pub struct DeterministicEligibilityEngine {
    catalog: Arc<ProgramCatalog>,
    heuristics: Heuristics,
}

impl Default for DeterministicEligibilityEngine {
    fn default() -> Self {
        Self::new(Arc::new(ProgramCatalog::standard()), Heuristics::default())
    }
}

impl DeterministicEligibilityEngine {
    pub fn new(catalog: Arc<ProgramCatalog>, heuristics: Heuristics) -> Self {
        Self { catalog, heuristics }
    }

    /// Engine and catalog built from the same heuristics.
    pub fn from_heuristics(heuristics: Heuristics) -> Self {
        Self::new(Arc::new(ProgramCatalog::from_heuristics(&heuristics)), heuristics)
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        &self.catalog
    }

    pub fn heuristics(&self) -> &Heuristics {
        &self.heuristics
    }

    pub fn report(&self, profile: &Profile) -> EligibilityReport {
        let facts = ProfileFacts::from_profile(profile);
        let mut evaluated_programs = Vec::new();
        let mut skipped_programs = Vec::new();
        for program in self.catalog.iter() {
            if program.eligibility.applies(&facts, &self.heuristics) {
                evaluated_programs.push(program.program_id());
            } else {
                skipped_programs.push(program.program_id());
            }
        }

        let results = self.rank(&facts);
        let qualified_count = results.iter().filter(|result| result.qualified).count();
        EligibilityReport { results, qualified_count, evaluated_programs, skipped_programs }
    }

    fn rank(&self, facts: &ProfileFacts) -> Vec<ProgramResult> {
        let mut results: Vec<ProgramResult> = self
            .catalog
            .iter()
            .filter(|program| program.eligibility.applies(facts, &self.heuristics))
            .map(|program| self.assess(program, facts))
            .collect();

        // stable: equal entries keep catalog declaration order
        results.sort_by(|left, right| {
            right.qualified.cmp(&left.qualified).then(right.confidence.cmp(&left.confidence))
        });

        tracing::debug!(
            event_name = "eligibility.evaluated",
            evaluated = results.len(),
            qualified = results.iter().filter(|result| result.qualified).count(),
            "eligibility evaluated"
        );
        results
    }

    fn assess(&self, program: &ProgramDefinition, facts: &ProfileFacts) -> ProgramResult {
        let assessment = program.eligibility.assess(facts, &self.heuristics);
        let (disqualification_code, explanation) = match assessment.disqualification {
            Some((code, message)) => (Some(code), Some(message)),
            None => (None, None),
        };

        let urgent = facts.urgent_actions();
        let urgent_notice = (assessment.qualified
            && program.eligibility.pauses_collection
            && !urgent.is_empty())
        .then(|| {
            format!(
                "Active {} reported: an accepted {} request can pause collection while it is reviewed.",
                urgent.join(" and "),
                program.name
            )
        });

        ProgramResult {
            id: program.program_id(),
            name: program.name.to_string(),
            category: program.category,
            qualified: assessment.qualified,
            confidence: assessment.confidence,
            score: assessment.score,
            disqualification_code,
            explanation,
            urgent_notice,
            metrics: DisplayMetrics::for_debt(&program.metadata, facts.debt_amount),
        }
    }
}

impl EligibilityEngine for DeterministicEligibilityEngine {
    fn evaluate(&self, profile: &Profile) -> Vec<ProgramResult> {
        self.rank(&ProfileFacts::from_profile(profile))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EligibilityReport {
    pub results: Vec<ProgramResult>,
    pub qualified_count: usize,
    pub evaluated_programs: Vec<ProgramId>,
    /// Programs whose applicability guard failed; absent from `results`.
    pub skipped_programs: Vec<ProgramId>,
}
