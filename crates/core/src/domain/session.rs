use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::answers::Answers;
use crate::domain::program::ProgramId;
use crate::finance::{round_for_display, PayoffEstimate};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("WS-{}", Uuid::new_v4()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Positioned on `current_step_index`.
    InProgress,
    ReadyToSubmit,
    Submitted,
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Abandoned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::ReadyToSubmit => "ready_to_submit",
            Self::Submitted => "submitted",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Upload metadata only; file contents never reach the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
    pub size_bytes: u64,
}

impl DocumentRef {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self { name: name.into(), size_bytes }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DerivedValue {
    Amount(Decimal),
    Days(i64),
    Count(u32),
    Payoff(PayoffEstimate),
}

impl DerivedValue {
    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Amount(amount) => format!("{:.2}", round_for_display(*amount)),
            Self::Days(days) => format!("{days} days"),
            Self::Count(count) => count.to_string(),
            Self::Payoff(estimate) => estimate.display(),
        }
    }
}

/// Resumable progress of one applicant through one program.
///
/// Holds no timestamps or runtime-only state, so a stored copy resumes exactly
/// where it left off and replaying the same actions rebuilds it byte for byte.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub id: SessionId,
    pub program_id: ProgramId,
    pub definition_version: u32,
    pub state: SessionState,
    /// Index into the program's full step list, always an included step.
    pub current_step_index: usize,
    pub answers: Answers,
    pub derived: BTreeMap<String, DerivedValue>,
    pub validation_errors: BTreeMap<String, String>,
    pub documents: Vec<DocumentRef>,
    pub completed: bool,
}

impl WorkflowSession {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Frozen hand-off to the submission collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub submission_id: SubmissionId,
    pub session_id: SessionId,
    pub program_id: ProgramId,
    pub definition_version: u32,
    pub answers: Answers,
    pub derived: BTreeMap<String, DerivedValue>,
    pub documents: Vec<DocumentRef>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{DerivedValue, SessionState};
    use crate::finance::PayoffEstimate;

    #[test]
    fn derived_values_render_at_the_display_boundary() {
        assert_eq!(DerivedValue::Amount(Decimal::new(1_234_567, 3)).display(), "1234.57");
        assert_eq!(DerivedValue::Payoff(PayoffEstimate::Months(57)).display(), "57 months");
        assert_eq!(DerivedValue::Payoff(PayoffEstimate::NeverPaysOff).display(), "never pays off");
    }

    #[test]
    fn only_submitted_and_abandoned_are_terminal() {
        assert!(!SessionState::InProgress.is_terminal());
        assert!(!SessionState::ReadyToSubmit.is_terminal());
        assert!(SessionState::Submitted.is_terminal());
        assert!(SessionState::Abandoned.is_terminal());
    }
}
