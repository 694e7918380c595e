use chrono::Utc;
use sqlx::Row;

use reliefpath_core::domain::profile::Profile;

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM profile_snapshot WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String =
            row.try_get("payload_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        serde_json::from_str(&payload).map(Some).map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn save(&self, id: &str, profile: &Profile) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(profile).map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO profile_snapshot (id, payload_json, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 payload_json = excluded.payload_json,
                 updated_at = excluded.updated_at",
        )
        .bind(id)
        .bind(&payload)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
