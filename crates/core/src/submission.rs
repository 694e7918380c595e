//! Hand-off of frozen submission payloads to whatever delivers them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::{SubmissionId, SubmissionPayload};
use crate::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted locally; delivery happens later.
    Queued,
    Delivered,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub submission_id: SubmissionId,
    pub status: DeliveryStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("submission `{0}` was already delivered")]
    Duplicate(String),
    #[error("submission sink unavailable: {0}")]
    Unavailable(String),
}

impl From<SubmissionError> for ApplicationError {
    fn from(error: SubmissionError) -> Self {
        ApplicationError::Submission(error.to_string())
    }
}

pub trait SubmissionSink: Send + Sync {
    fn deliver(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmissionError>;
}

#[derive(Clone, Default)]
pub struct InMemorySubmissionOutbox {
    payloads: Arc<Mutex<Vec<SubmissionPayload>>>,
}

impl InMemorySubmissionOutbox {
    pub fn payloads(&self) -> Vec<SubmissionPayload> {
        match self.payloads.lock() {
            Ok(payloads) => payloads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SubmissionSink for InMemorySubmissionOutbox {
    fn deliver(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmissionError> {
        let mut payloads = match self.payloads.lock() {
            Ok(payloads) => payloads,
            Err(poisoned) => poisoned.into_inner(),
        };
        if payloads.iter().any(|queued| queued.submission_id == payload.submission_id) {
            return Err(SubmissionError::Duplicate(payload.submission_id.0.clone()));
        }
        payloads.push(payload.clone());

        tracing::info!(
            event_name = "submission.queued",
            submission_id = %payload.submission_id.0,
            session_id = %payload.session_id,
            program_id = %payload.program_id,
            "submission queued in memory"
        );
        Ok(SubmissionReceipt {
            submission_id: payload.submission_id.clone(),
            status: DeliveryStatus::Queued,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use super::{DeliveryStatus, InMemorySubmissionOutbox, SubmissionError, SubmissionSink};
    use crate::domain::answers::Answers;
    use crate::domain::program::ProgramId;
    use crate::domain::session::{SessionId, SubmissionId, SubmissionPayload};

    fn payload(id: &str) -> SubmissionPayload {
        SubmissionPayload {
            submission_id: SubmissionId(id.to_string()),
            session_id: SessionId("WS-1".to_string()),
            program_id: ProgramId::new("penalty_abatement"),
            definition_version: 1,
            answers: Answers::new(),
            derived: BTreeMap::new(),
            documents: Vec::new(),
            submitted_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap_or_default(),
        }
    }

    #[test]
    fn outbox_queues_once_per_submission_id() {
        let outbox = InMemorySubmissionOutbox::default();

        let receipt = outbox.deliver(&payload("SUB-1")).expect("first delivery");
        assert_eq!(receipt.status, DeliveryStatus::Queued);
        assert_eq!(
            outbox.deliver(&payload("SUB-1")),
            Err(SubmissionError::Duplicate("SUB-1".to_string()))
        );
        assert_eq!(outbox.payloads().len(), 1);
    }
}
