pub mod actions;
pub mod definition;
pub mod engine;

pub use actions::{ActionOutcome, FieldView, RejectedAction, ReplayOutcome, WorkflowAction};
pub use definition::{
    Certification, CertificationCheck, Derivation, DerivedField, FieldKind, FieldSpec,
    ProgramDefinition, Requirement, StepDefinition,
};
pub use engine::{Submission, WorkflowEngine};
