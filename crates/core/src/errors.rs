use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-addressable, user-correctable rejection of `next` or `submit`.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{} field(s) failed validation", .fields.len())]
pub struct ValidationFailure {
    /// Step that was being left; `None` for a whole-session submit check.
    pub step_id: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl ValidationFailure {
    pub fn new(step_id: Option<String>, fields: BTreeMap<String, String>) -> Self {
        Self { step_id, fields }
    }

    pub fn message_for(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Programmer or caller misuse. Never silently ignored.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateViolation {
    #[error("session {session_id} is {state} and accepts no further changes")]
    TerminalSession { session_id: String, state: String },
    #[error("unknown program `{0}`")]
    UnknownProgram(String),
    #[error("program `{program_id}` has no field `{key}`")]
    UnknownField { program_id: String, key: String },
    #[error("no attached document named `{0}`")]
    UnknownDocument(String),
    #[error("session belongs to program `{session}` but engine drives `{engine}`")]
    ProgramMismatch { session: String, engine: String },
    #[error("session was started on definition v{session} but current definition is v{current}")]
    DefinitionVersionMismatch { session: u32, current: u32 },
    #[error("session is {state}; submit requires ready_to_submit")]
    NotReadyToSubmit { state: String },
    #[error("session is already past the last step")]
    NoFurtherStep,
    #[error("session is already on the first step")]
    NoPreviousStep,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    State(#[from] StateViolation),
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failure",
            Self::State(_) => "state_violation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("submission failure: {0}")]
    Submission(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ValidationFailure> for ApplicationError {
    fn from(value: ValidationFailure) -> Self {
        Self::Workflow(value.into())
    }
}

impl From<StateViolation> for ApplicationError {
    fn from(value: StateViolation) -> Self {
        Self::Workflow(value.into())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Workflow(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Storage(message) | ApplicationError::Submission(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
