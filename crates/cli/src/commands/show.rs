use reliefpath_core::domain::session::{SessionId, WorkflowSession};
use reliefpath_core::programs::ProgramCatalog;
use reliefpath_core::workflow::FieldView;
use reliefpath_db::{SessionRepository, SqlSessionRepository};
use serde::Serialize;

use crate::commands::{load_config, open_store, runtime, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct SessionView {
    current_step: Option<&'static str>,
    current_step_title: Option<&'static str>,
    position: usize,
    total_steps: usize,
    fields: Vec<FieldView>,
    session: WorkflowSession,
}

pub fn run(session_id: &str) -> CommandResult {
    match show(session_id) {
        Ok(result) => result,
        Err(failure) => CommandResult::from_failure("show", failure),
    }
}

fn show(session_id: &str) -> Result<CommandResult, Failure> {
    let config = load_config()?;
    let runtime = runtime()?;

    let session = runtime.block_on(async {
        let pool = open_store(&config).await?;
        let repo = SqlSessionRepository::new(pool.clone());
        let found = repo
            .find_by_id(&SessionId(session_id.to_string()))
            .await
            .map_err(|error| ("storage", error.to_string(), 7u8))?;
        pool.close().await;
        found.ok_or_else(|| ("session_not_found", format!("no stored session `{session_id}`"), 7u8))
    })?;

    let catalog = ProgramCatalog::from_heuristics(&config.heuristics);
    let engine = catalog
        .engine_for(session.program_id.as_str())
        .map_err(|violation| ("unknown_program", violation.to_string(), 9u8))?;

    let current = engine.current_step(&session);
    let (position, total_steps) = engine.progress(&session);
    let view = SessionView {
        current_step: current.map(|step| step.id),
        current_step_title: current.map(|step| step.title),
        position,
        total_steps,
        fields: engine.visible_fields(&session),
        session,
    };

    let message = format!(
        "session `{session_id}` for {} is {}",
        view.session.program_id,
        view.session.state.as_str()
    );
    Ok(CommandResult::success_with("show", message, &view))
}
