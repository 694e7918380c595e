use std::collections::HashMap;

use tokio::sync::RwLock;

use reliefpath_core::domain::profile::Profile;
use reliefpath_core::domain::session::{SessionId, WorkflowSession};

use super::{frozen, ProfileRepository, RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, WorkflowSession>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if let Some(stored) = sessions.get(&session.id.0) {
            if stored.is_terminal() {
                return Err(frozen(stored));
            }
        }
        sessions.insert(session.id.0.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, Profile>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(id).cloned())
    }

    async fn save(&self, id: &str, profile: &Profile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(id.to_string(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reliefpath_core::domain::profile::Profile;
    use reliefpath_core::domain::session::{SessionId, SessionState};
    use reliefpath_core::programs::ProgramCatalog;
    use serde_json::json;

    use crate::repositories::{
        InMemoryProfileRepository, InMemorySessionRepository, ProfileRepository, RepositoryError,
        SessionRepository,
    };

    #[tokio::test]
    async fn in_memory_session_repo_round_trip() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("penalty_abatement").expect("program");
        let session = engine.start(SessionId("WS-mem".to_string()));
        let session = engine.set_field(&session, "city", json!("Reno")).expect("field");

        let repo = InMemorySessionRepository::default();
        repo.save(&session).await.expect("save session");

        assert_eq!(repo.load(&session.id).await.expect("load"), session);
        assert!(repo.delete(&session.id).await.expect("delete"));
        assert!(matches!(
            repo.load(&session.id).await,
            Err(RepositoryError::NotFound(id)) if id == "WS-mem"
        ));
    }

    #[tokio::test]
    async fn terminal_sessions_cannot_be_overwritten() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("innocent_spouse").expect("program");
        let session = engine.start(SessionId("WS-done".to_string()));
        let abandoned = engine.abandon(&session).expect("abandon");

        let repo = InMemorySessionRepository::default();
        repo.save(&session).await.expect("save in progress");
        repo.save(&abandoned).await.expect("save terminal over in progress");

        let error = repo.save(&session).await.expect_err("terminal is frozen");
        assert!(matches!(error, RepositoryError::Frozen { ref state, .. } if state == "abandoned"));
        assert_eq!(
            repo.load(&session.id).await.expect("load").state,
            SessionState::Abandoned
        );
    }

    #[tokio::test]
    async fn in_memory_profile_repo_round_trip() {
        let repo = InMemoryProfileRepository::default();
        let profile = Profile { total_debt: "10k-25k".to_string(), ..Profile::default() };

        repo.save("household-7", &profile).await.expect("save profile");
        assert_eq!(repo.find_by_id("household-7").await.expect("find"), Some(profile));
        assert_eq!(repo.find_by_id("household-8").await.expect("find"), None);
    }
}
