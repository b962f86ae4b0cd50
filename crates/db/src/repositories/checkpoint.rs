use sqlx::Row;

use nestplan_core::workflow::state::WorkflowState;
use nestplan_core::ThreadId;

use super::{CheckpointRepository, RepositoryError};
use crate::DbPool;

/// Durable checkpoint store: one JSON-serialized [`WorkflowState`] row per
/// logical thread, replaced on every save.
pub struct SqlCheckpointRepository {
    pool: DbPool,
}

impl SqlCheckpointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CheckpointRepository for SqlCheckpointRepository {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<WorkflowState>, RepositoryError> {
        let row = sqlx::query("SELECT state FROM workflow_checkpoints WHERE thread_id = ?")
            .bind(&thread_id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String =
                    row.try_get("state").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let state = serde_json::from_str(&raw)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, state: &WorkflowState) -> Result<(), RepositoryError> {
        let raw =
            serde_json::to_string(state).map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO workflow_checkpoints (thread_id, status, state, updated_at)
             VALUES (?, ?, ?, datetime('now'))
             ON CONFLICT(thread_id) DO UPDATE SET
                 status = excluded.status,
                 state = excluded.state,
                 updated_at = excluded.updated_at",
        )
        .bind(&state.thread_id.0)
        .bind(state.status.as_str())
        .bind(&raw)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
