use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::program::ProgramId;
use crate::domain::session::{SessionId, WorkflowSession};
use crate::errors::WorkflowError;
use crate::workflow::actions::{ActionOutcome, WorkflowAction};

pub const ACTION_APPLIED: &str = "workflow.action_applied";
pub const ACTION_REJECTED: &str = "workflow.action_rejected";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Eligibility,
    Workflow,
    Submission,
    Persistence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub session_id: Option<SessionId>,
    pub program_id: Option<ProgramId>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        session_id: Option<SessionId>,
        program_id: Option<ProgramId>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { session_id, program_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }

    /// Context scoped to one workflow session and its program.
    pub fn for_session(
        session: &WorkflowSession,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self::new(Some(session.id.clone()), Some(session.program_id.clone()), correlation_id, actor)
    }

    /// Same correlation and actor, rescoped to `session`.
    pub fn scoped_to(&self, session: &WorkflowSession) -> Self {
        Self::for_session(session, self.correlation_id.clone(), self.actor.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub session_id: Option<SessionId>,
    pub program_id: Option<ProgramId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        context: &AuditContext,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id: context.session_id.clone(),
            program_id: context.program_id.clone(),
            correlation_id: context.correlation_id.clone(),
            event_type: event_type.into(),
            category,
            actor: context.actor.clone(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    /// An accepted workflow action, stamped with the action time rather than the wall clock.
    pub fn action_applied(
        context: &AuditContext,
        action: &WorkflowAction,
        outcome: &ActionOutcome,
        at: DateTime<Utc>,
    ) -> Self {
        let session = &outcome.session;
        let event = Self::new(context, ACTION_APPLIED, AuditCategory::Workflow, AuditOutcome::Success)
            .at(at)
            .with_metadata("action", action.name())
            .with_metadata("state", session.state.as_str())
            .with_metadata("current_step_index", session.current_step_index.to_string());
        match &outcome.submission {
            Some(payload) => event.with_metadata("submission_id", payload.submission_id.0.clone()),
            None => event,
        }
    }

    pub fn action_rejected(
        context: &AuditContext,
        action: &WorkflowAction,
        error: &WorkflowError,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(context, ACTION_REJECTED, AuditCategory::Workflow, AuditOutcome::Rejected)
            .at(at)
            .with_metadata("action", action.name())
            .with_metadata("kind", error.kind())
            .with_metadata("error", error.to_string())
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-session tally of recorded workflow events, as reported back to callers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub session_id: Option<SessionId>,
    pub applied: usize,
    pub rejected: usize,
    pub rejected_kinds: BTreeMap<String, usize>,
    pub submission_ids: Vec<String>,
}

impl AuditTrail {
    pub fn for_session(session_id: &SessionId, events: &[AuditEvent]) -> Self {
        let mut trail = Self { session_id: Some(session_id.clone()), ..Self::default() };
        let scoped = events.iter().filter(|event| event.session_id.as_ref() == Some(session_id));
        for event in scoped {
            match event.event_type.as_str() {
                ACTION_APPLIED => {
                    trail.applied += 1;
                    trail.submission_ids.extend(event.metadata.get("submission_id").cloned());
                }
                ACTION_REJECTED => {
                    trail.rejected += 1;
                    let kind = event.metadata.get("kind").cloned().unwrap_or_default();
                    *trail.rejected_kinds.entry(kind).or_default() += 1;
                }
                _ => {}
            }
        }
        trail
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn trail(&self, session_id: &SessionId) -> AuditTrail {
        AuditTrail::for_session(session_id, &self.events())
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
