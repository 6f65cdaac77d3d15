mod model;

use async_trait::async_trait;
use model::RunStorageModel;

use crate::{
    storage::{RunStorage, StorageError},
    subscription::SubscriptionId,
    workflow::WorkflowRun,
};

pub struct SqliteRunStorage {
    pool: sqlx::SqlitePool,
}

impl SqliteRunStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStorage for SqliteRunStorage {
    async fn get(&self, id: &SubscriptionId) -> Result<Option<WorkflowRun>, StorageError> {
        let run = sqlx::query_as::<_, RunStorageModel>(
            "SELECT * FROM workflow_runs WHERE subscription_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        run.map(TryInto::try_into).transpose()
    }

    async fn save(&self, run: &WorkflowRun) -> Result<(), StorageError> {
        let RunStorageModel {
            subscription_id,
            state,
            abort_reason,
            next_checkpoint_index,
            planned_renewal,
            resume_at,
            delivered,
            skipped,
            created_at,
            updated_at,
        } = run.into();

        sqlx::query(
            "
INSERT INTO workflow_runs (subscription_id, state, abort_reason, next_checkpoint_index,
                           planned_renewal, resume_at, delivered, skipped, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (subscription_id) DO UPDATE
SET state = excluded.state,
    abort_reason = excluded.abort_reason,
    next_checkpoint_index = excluded.next_checkpoint_index,
    planned_renewal = excluded.planned_renewal,
    resume_at = excluded.resume_at,
    delivered = excluded.delivered,
    skipped = excluded.skipped,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at
",
        )
        .bind(subscription_id)
        .bind(state)
        .bind(abort_reason)
        .bind(next_checkpoint_index)
        .bind(planned_renewal)
        .bind(resume_at)
        .bind(delivered)
        .bind(skipped)
        .bind(created_at)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<WorkflowRun>, StorageError> {
        let runs = sqlx::query_as::<_, RunStorageModel>(
            "SELECT * FROM workflow_runs WHERE state IN ('Pending', 'Waiting')",
        )
        .fetch_all(&self.pool)
        .await?;

        runs.into_iter().map(TryInto::try_into).collect()
    }
}
