use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use reliefpath_core::domain::session::{SessionId, WorkflowSession};
use reliefpath_core::programs::ProgramCatalog;
use reliefpath_core::workflow::RejectedAction;
use reliefpath_core::{
    AuditContext, AuditTrail, InMemoryAuditSink, SubmissionReceipt, SubmissionSink, WorkflowAction,
};
use reliefpath_db::{SessionRepository, SqlSessionRepository};
use serde::Serialize;

use crate::commands::{load_config, open_store, read_json, runtime, CommandResult, Failure};
use crate::outbox::FileSubmissionOutbox;

/// Where a script starts: a fresh session for a program, or a stored session.
#[derive(Clone, Copy, Debug)]
pub enum ApplyTarget<'a> {
    Program(&'a str),
    Session(&'a str),
}

#[derive(Debug, Serialize)]
struct ApplyReport {
    session_id: SessionId,
    program_id: String,
    state: &'static str,
    current_step: Option<&'static str>,
    position: usize,
    total_steps: usize,
    applied: usize,
    rejected: Vec<RejectedAction>,
    validation_errors: BTreeMap<String, String>,
    derived: BTreeMap<String, String>,
    submissions: Vec<SubmissionReceipt>,
    audit: AuditTrail,
}

pub fn run(target: ApplyTarget<'_>, script_path: &Path) -> CommandResult {
    match apply(target, script_path) {
        Ok(result) => result,
        Err(failure) => CommandResult::from_failure("apply", failure),
    }
}

fn apply(target: ApplyTarget<'_>, script_path: &Path) -> Result<CommandResult, Failure> {
    let config = load_config()?;
    let script: Vec<WorkflowAction> = read_json(script_path, "action script")?;
    let catalog = ProgramCatalog::from_heuristics(&config.heuristics);
    let outbox = FileSubmissionOutbox::new(config.submission.outbox_dir.clone());
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = open_store(&config).await?;
        let repo = SqlSessionRepository::new(pool.clone());

        let (session, program_id) = match target {
            ApplyTarget::Program(program_id) => (None, program_id.to_string()),
            ApplyTarget::Session(session_id) => {
                let stored = repo
                    .find_by_id(&SessionId(session_id.to_string()))
                    .await
                    .map_err(|error| ("storage", error.to_string(), 7u8))?
                    .ok_or_else(|| {
                        ("session_not_found", format!("no stored session `{session_id}`"), 7u8)
                    })?;
                let program_id = stored.program_id.as_str().to_string();
                (Some(stored), program_id)
            }
        };

        let engine = catalog
            .engine_for(&program_id)
            .map_err(|violation| ("unknown_program", violation.to_string(), 9u8))?;
        let session = session.unwrap_or_else(|| engine.start(SessionId::generate()));

        let correlation_id = SessionId::generate().0;
        let sink = InMemoryAuditSink::default();
        let outcome = engine.replay_with_audit(
            &session,
            &script,
            Utc::now(),
            &sink,
            &AuditContext::for_session(&session, correlation_id.clone(), "cli"),
        );
        let trail = sink.trail(&session.id);

        let mut receipts = Vec::with_capacity(outcome.submissions.len());
        for payload in &outcome.submissions {
            let receipt = outbox
                .deliver(payload)
                .map_err(|error| ("submission", error.to_string(), 8u8))?;
            receipts.push(receipt);
        }

        // A rejected-only script against a terminal session changes nothing; skip the write.
        if outcome.session != session {
            repo.save(&outcome.session).await.map_err(|error| ("storage", error.to_string(), 7u8))?;
        }
        pool.close().await;

        tracing::info!(
            event_name = "cli.script_applied",
            session_id = %outcome.session.id,
            program_id = %outcome.session.program_id,
            correlation_id = %correlation_id,
            actions = script.len(),
            rejected = outcome.rejected.len(),
            state = outcome.session.state.as_str(),
            "action script applied"
        );

        let (position, total_steps) = engine.progress(&outcome.session);
        let report = ApplyReport {
            current_step: engine.current_step(&outcome.session).map(|step| step.id),
            position,
            total_steps,
            applied: script.len() - outcome.rejected.len(),
            derived: display_derived(&outcome.session),
            validation_errors: outcome.session.validation_errors.clone(),
            session_id: outcome.session.id.clone(),
            program_id: outcome.session.program_id.as_str().to_string(),
            state: outcome.session.state.as_str(),
            rejected: outcome.rejected,
            submissions: receipts,
            audit: trail,
        };
        let message = format!(
            "applied {} of {} actions; session is {}",
            report.applied,
            script.len(),
            report.state
        );
        Ok::<CommandResult, Failure>(CommandResult::success_with("apply", message, &report))
    })
}

fn display_derived(session: &WorkflowSession) -> BTreeMap<String, String> {
    session.derived.iter().map(|(key, value)| (key.clone(), value.display())).collect()
}
