use async_trait::async_trait;
use thiserror::Error;

use reliefpath_core::domain::profile::Profile;
use reliefpath_core::domain::session::{SessionId, WorkflowSession};
use reliefpath_core::errors::ApplicationError;

pub mod memory;
pub mod profile;
pub mod session;

pub use memory::{InMemoryProfileRepository, InMemorySessionRepository};
pub use profile::SqlProfileRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no stored record for `{0}`")]
    NotFound(String),
    #[error("session `{session_id}` is {state} and can no longer be overwritten")]
    Frozen { session_id: String, state: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Storage(error.to_string())
    }
}

/// Durable home for workflow sessions between invocations.
///
/// Implementations must refuse to overwrite a stored session that already
/// reached a terminal state.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError>;

    async fn load(&self, id: &SessionId) -> Result<WorkflowSession, RepositoryError> {
        self.find_by_id(id).await?.ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, session: &WorkflowSession) -> Result<(), RepositoryError>;

    /// Returns whether a session was removed.
    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>, RepositoryError>;
    async fn save(&self, id: &str, profile: &Profile) -> Result<(), RepositoryError>;
}

pub(crate) fn frozen(session: &WorkflowSession) -> RepositoryError {
    RepositoryError::Frozen {
        session_id: session.id.to_string(),
        state: session.state.as_str().to_string(),
    }
}
