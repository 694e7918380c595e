use std::path::Path;

use reliefpath_core::domain::session::SessionId;
use reliefpath_core::{
    AuditContext, DeterministicEligibilityEngine, EligibilityEngine, InMemoryAuditSink, Profile,
};
use reliefpath_db::{ProfileRepository, SqlProfileRepository};

use crate::commands::{load_config, open_store, read_json, runtime, CommandResult, Failure};

pub fn run(profile_path: &Path, save_as: Option<&str>) -> CommandResult {
    match evaluate(profile_path, save_as) {
        Ok(result) => result,
        Err(failure) => CommandResult::from_failure("evaluate", failure),
    }
}

fn evaluate(profile_path: &Path, save_as: Option<&str>) -> Result<CommandResult, Failure> {
    let config = load_config()?;
    let profile: Profile = read_json(profile_path, "profile")?;

    let engine = DeterministicEligibilityEngine::from_heuristics(config.heuristics.clone());
    let correlation_id = SessionId::generate().0;
    let sink = InMemoryAuditSink::default();
    engine.evaluate_with_audit(
        &profile,
        &sink,
        &AuditContext::new(None, None, correlation_id.clone(), "cli"),
    );
    let report = engine.report(&profile);

    if let Some(id) = save_as {
        let runtime = runtime()?;
        runtime.block_on(async {
            let pool = open_store(&config).await?;
            let repo = SqlProfileRepository::new(pool.clone());
            repo.save(id, &profile).await.map_err(|error| ("storage", error.to_string(), 7u8))?;
            pool.close().await;
            Ok::<(), Failure>(())
        })?;
    }

    tracing::info!(
        event_name = "cli.evaluated",
        correlation_id = %correlation_id,
        evaluated = report.results.len(),
        qualified = report.qualified_count,
        audit_events = sink.events().len(),
        saved_as = save_as.unwrap_or("-"),
        "eligibility evaluated"
    );

    Ok(CommandResult::success_with(
        "evaluate",
        format!(
            "{} of {} applicable programs qualified",
            report.qualified_count,
            report.results.len()
        ),
        &report,
    ))
}
