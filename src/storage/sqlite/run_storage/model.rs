use chrono::{DateTime, Utc};

use crate::{
    storage::StorageError,
    workflow::{AbortReason, RunState, WorkflowRun},
};

#[derive(sqlx::FromRow)]
pub struct RunStorageModel {
    pub subscription_id: String,
    pub state: String,
    pub abort_reason: Option<String>,
    pub next_checkpoint_index: i64,
    pub planned_renewal: Option<DateTime<Utc>>,
    pub resume_at: Option<DateTime<Utc>>,
    pub delivered: i64,
    pub skipped: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowRun> for RunStorageModel {
    fn from(value: &WorkflowRun) -> Self {
        Self {
            subscription_id: value.subscription_id.clone(),
            state: value.state.as_str().to_string(),
            abort_reason: value.abort_reason.map(|reason| reason.as_str().to_string()),
            next_checkpoint_index: value.next_checkpoint_index as i64,
            planned_renewal: value.planned_renewal,
            resume_at: value.resume_at,
            delivered: value.delivered.into(),
            skipped: value.skipped.into(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl TryFrom<RunStorageModel> for WorkflowRun {
    type Error = StorageError;

    fn try_from(value: RunStorageModel) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| {
            StorageError::Corrupt(format!("run {}: {reason}", value.subscription_id))
        };

        let state: RunState = value.state.parse().map_err(corrupt)?;
        let abort_reason = value
            .abort_reason
            .as_deref()
            .map(str::parse::<AbortReason>)
            .transpose()
            .map_err(corrupt)?;
        let next_checkpoint_index = usize::try_from(value.next_checkpoint_index)
            .map_err(|e| corrupt(e.to_string()))?;
        let delivered = u32::try_from(value.delivered).map_err(|e| corrupt(e.to_string()))?;
        let skipped = u32::try_from(value.skipped).map_err(|e| corrupt(e.to_string()))?;

        Ok(Self {
            subscription_id: value.subscription_id,
            state,
            abort_reason,
            next_checkpoint_index,
            planned_renewal: value.planned_renewal,
            resume_at: value.resume_at,
            delivered,
            skipped,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}
