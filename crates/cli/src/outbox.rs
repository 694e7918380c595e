use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use reliefpath_core::domain::session::SubmissionPayload;
use reliefpath_core::submission::{DeliveryStatus, SubmissionError};
use reliefpath_core::{SubmissionReceipt, SubmissionSink};

/// Writes each submission payload to `<outbox_dir>/<submission_id>.json`.
///
/// Files are created exclusively, so a payload is never written twice.
#[derive(Clone, Debug)]
pub struct FileSubmissionOutbox {
    dir: PathBuf,
}

impl FileSubmissionOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, submission_id: &str) -> PathBuf {
        self.dir.join(format!("{submission_id}.json"))
    }
}

impl SubmissionSink for FileSubmissionOutbox {
    fn deliver(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmissionError> {
        let submission_id = &payload.submission_id.0;
        fs::create_dir_all(&self.dir).map_err(|error| {
            SubmissionError::Unavailable(format!("{}: {error}", self.dir.display()))
        })?;

        let body = serde_json::to_vec_pretty(payload)
            .map_err(|error| SubmissionError::Unavailable(error.to_string()))?;
        let path = self.path_for(submission_id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                return Err(SubmissionError::Duplicate(submission_id.clone()));
            }
            Err(error) => {
                return Err(SubmissionError::Unavailable(format!("{}: {error}", path.display())));
            }
        };
        file.write_all(&body)
            .map_err(|error| SubmissionError::Unavailable(format!("{}: {error}", path.display())))?;

        tracing::info!(
            event_name = "submission.queued",
            session_id = %payload.session_id,
            program_id = %payload.program_id,
            submission_id = %submission_id,
            path = %path.display(),
            "submission written to outbox"
        );
        Ok(SubmissionReceipt { submission_id: payload.submission_id.clone(), status: DeliveryStatus::Queued })
    }
}
