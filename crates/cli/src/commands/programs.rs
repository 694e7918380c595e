use reliefpath_core::programs::ProgramCatalog;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ProgramSummary {
    id: &'static str,
    name: &'static str,
    category: reliefpath_core::domain::program::ProgramCategory,
    version: u32,
    summary: &'static str,
    steps: Vec<&'static str>,
}

/// Lists the catalog in declaration order.
pub fn run() -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure("programs", failure),
    };

    let catalog = ProgramCatalog::from_heuristics(&config.heuristics);
    let programs: Vec<ProgramSummary> = catalog
        .iter()
        .map(|program| ProgramSummary {
            id: program.id,
            name: program.name,
            category: program.category,
            version: program.version,
            summary: program.summary,
            steps: program.steps.iter().map(|step| step.id).collect(),
        })
        .collect();

    CommandResult::success_with(
        "programs",
        format!("{} relief programs available", programs.len()),
        &programs,
    )
}
