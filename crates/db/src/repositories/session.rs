use chrono::Utc;
use sqlx::Row;

use reliefpath_core::domain::session::{SessionId, WorkflowSession};

use super::{frozen, RepositoryError, SessionRepository};
use crate::DbPool;

/// Sessions are stored whole as JSON; the indexed columns mirror it for lookups.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_ids_for_program(
        &self,
        program_id: &str,
    ) -> Result<Vec<SessionId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id FROM workflow_session WHERE program_id = ? ORDER BY created_at, id",
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("id")
                    .map(SessionId)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .collect()
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowSession, RepositoryError> {
    let payload: String =
        row.try_get("payload_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    serde_json::from_str(&payload).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM workflow_session WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(session).map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        // The update is skipped when the stored row is already terminal.
        let result = sqlx::query(
            "INSERT INTO workflow_session (id, program_id, definition_version, state,
                                           payload_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 program_id = excluded.program_id,
                 definition_version = excluded.definition_version,
                 state = excluded.state,
                 payload_json = excluded.payload_json,
                 updated_at = excluded.updated_at
             WHERE workflow_session.state NOT IN ('submitted', 'abandoned')",
        )
        .bind(&session.id.0)
        .bind(session.program_id.as_str())
        .bind(i64::from(session.definition_version))
        .bind(session.state.as_str())
        .bind(&payload)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let stored = self.load(&session.id).await?;
            return Err(frozen(&stored));
        }

        tracing::debug!(
            event_name = "db.session_saved",
            session_id = %session.id,
            program_id = %session.program_id,
            state = session.state.as_str(),
            "workflow session persisted"
        );
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflow_session WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
