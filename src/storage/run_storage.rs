use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{subscription::SubscriptionId, workflow::WorkflowRun};

use super::StorageError;

#[async_trait]
pub trait RunStorage: Send + Sync {
    async fn get(&self, id: &SubscriptionId) -> Result<Option<WorkflowRun>, StorageError>;
    /// Inserts or replaces the run keyed by its subscription id.
    async fn save(&self, run: &WorkflowRun) -> Result<(), StorageError>;
    async fn list_active(&self) -> Result<Vec<WorkflowRun>, StorageError>;

    /// Non-terminal runs that should have been woken by `now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowRun>, StorageError> {
        let runs = self.list_active().await?;
        Ok(runs
            .into_iter()
            .filter(|run| run.resume_at.is_none_or(|resume_at| resume_at <= now))
            .collect())
    }
}

pub struct InMemoryRunStorage {
    store: RwLock<HashMap<SubscriptionId, WorkflowRun>>,
}

impl InMemoryRunStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRunStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStorage for InMemoryRunStorage {
    async fn get(&self, id: &SubscriptionId) -> Result<Option<WorkflowRun>, StorageError> {
        let store = self.store.read().await;
        Ok(store.get(id).cloned())
    }

    async fn save(&self, run: &WorkflowRun) -> Result<(), StorageError> {
        let mut store = self.store.write().await;
        store.insert(run.subscription_id.clone(), run.clone());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<WorkflowRun>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .values()
            .filter(|run| !run.is_terminal())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::utc;

    #[tokio::test]
    async fn list_due_skips_terminal_and_future_runs() {
        let storage = InMemoryRunStorage::new();
        let now = utc(2024, 1, 26);

        let fresh = WorkflowRun::new("fresh".to_string(), now);
        let mut overdue = WorkflowRun::new("overdue".to_string(), now);
        overdue.wait_for(0, utc(2024, 1, 25));
        let mut sleeping = WorkflowRun::new("sleeping".to_string(), now);
        sleeping.wait_for(1, utc(2024, 1, 27));
        let mut finished = WorkflowRun::new("finished".to_string(), now);
        finished.complete();

        for run in [&fresh, &overdue, &sleeping, &finished] {
            storage.save(run).await.unwrap();
        }

        let mut due: Vec<_> = storage
            .list_due(now)
            .await
            .unwrap()
            .into_iter()
            .map(|run| run.subscription_id)
            .collect();
        due.sort();

        assert_eq!(due, vec!["fresh".to_string(), "overdue".to_string()]);
        assert_eq!(storage.list_active().await.unwrap().len(), 3);
    }
}
