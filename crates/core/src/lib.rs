//! Debt-relief eligibility scoring and guided application workflows.
//!
//! The eligibility engine ranks relief programs for a loosely-typed financial
//! profile. The workflow engine walks an applicant through one program's
//! conditional steps, validating answers and recomputing derived figures until
//! the application is frozen for submission. Both are pure: storage and
//! delivery live behind [`submission::SubmissionSink`] and the `reliefpath-db`
//! repositories.

pub mod audit;
pub mod condition;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod finance;
pub mod programs;
pub mod submission;
pub mod validators;
pub mod workflow;

pub use audit::{AuditContext, AuditEvent, AuditSink, AuditTrail, InMemoryAuditSink};
pub use domain::answers::Answers;
pub use domain::profile::{Circumstance, FilingStatus, Profile, ProfileFacts};
pub use domain::program::{ConfidenceTier, ProgramId, ProgramResult};
pub use domain::session::{
    DerivedValue, DocumentRef, SessionId, SessionState, SubmissionId, SubmissionPayload,
    WorkflowSession,
};
pub use eligibility::{
    DeterministicEligibilityEngine, EligibilityEngine, EligibilityReport, Heuristics,
};
pub use errors::{
    ApplicationError, InterfaceError, StateViolation, ValidationFailure, WorkflowError,
};
pub use programs::ProgramCatalog;
pub use submission::{InMemorySubmissionOutbox, SubmissionReceipt, SubmissionSink};
pub use workflow::{WorkflowAction, WorkflowEngine};
