use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::session::{SubmissionPayload, WorkflowSession};
use crate::workflow::definition::FieldKind;

/// One caller intent against a session. Scripts and stored action logs use this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    SetField { key: String, value: Value },
    ClearField { key: String },
    AttachDocument { name: String, size_bytes: u64 },
    RemoveDocument { name: String },
    Next,
    Back,
    Submit,
    Abandon,
}

impl WorkflowAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetField { .. } => "set_field",
            Self::ClearField { .. } => "clear_field",
            Self::AttachDocument { .. } => "attach_document",
            Self::RemoveDocument { .. } => "remove_document",
            Self::Next => "next",
            Self::Back => "back",
            Self::Submit => "submit",
            Self::Abandon => "abandon",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub session: WorkflowSession,
    /// Present only for an accepted `submit`.
    pub submission: Option<SubmissionPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RejectedAction {
    pub index: usize,
    pub action: WorkflowAction,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReplayOutcome {
    pub session: WorkflowSession,
    pub rejected: Vec<RejectedAction>,
    pub submissions: Vec<SubmissionPayload>,
}

/// A field of the effective step list as a caller should render it now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub step_id: &'static str,
    pub key: &'static str,
    pub label: &'static str,
    pub kind: &'static str,
    pub required: bool,
    pub error: Option<String>,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::LongText => "long_text",
            Self::Choice => "choice",
            Self::Flag => "flag",
            Self::Currency => "currency",
            Self::Integer => "integer",
            Self::Date => "date",
            Self::Identifier => "identifier",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Documents => "documents",
        }
    }
}
