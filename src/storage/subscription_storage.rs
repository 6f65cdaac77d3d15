use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::subscription::{NewSubscription, Subscription, SubscriptionId, SubscriptionStatus};

use super::StorageError;

#[async_trait]
pub trait SubscriptionStorage: Send + Sync {
    /// Fails with [`StorageError::NotFound`] when no record exists.
    async fn get(&self, id: &SubscriptionId) -> Result<Subscription, StorageError>;
    async fn insert(
        &self,
        subscription: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, StorageError>;
    async fn set_status(
        &self,
        id: &SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Subscription, StorageError>;
    async fn set_renewal_date(
        &self,
        id: &SubscriptionId,
        renewal_date: DateTime<Utc>,
    ) -> Result<Subscription, StorageError>;
}

struct InMemorySubscriptionStore {
    current_id: u64,
    storage: HashMap<SubscriptionId, Subscription>,
}

pub struct InMemorySubscriptionStorage {
    store: RwLock<InMemorySubscriptionStore>,
}

impl InMemorySubscriptionStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(InMemorySubscriptionStore {
                current_id: 0,
                storage: HashMap::new(),
            }),
        }
    }

    /// Stores a fully formed record as is, replacing any previous one.
    pub async fn put(&self, subscription: Subscription) {
        let mut store = self.store.write().await;
        store.storage.insert(subscription.id.clone(), subscription);
    }

    async fn update_with(
        &self,
        id: &SubscriptionId,
        update: impl FnOnce(&mut Subscription) + Send,
    ) -> Result<Subscription, StorageError> {
        let mut store = self.store.write().await;
        let subscription = store
            .storage
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        update(subscription);
        Ok(subscription.clone())
    }
}

impl Default for InMemorySubscriptionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStorage for InMemorySubscriptionStorage {
    async fn get(&self, id: &SubscriptionId) -> Result<Subscription, StorageError> {
        let store = self.store.read().await;
        store
            .storage
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    async fn insert(
        &self,
        subscription: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, StorageError> {
        let mut store = self.store.write().await;
        store.current_id += 1;
        let id = format!("sub-{}", store.current_id);
        let created = Subscription::create(id.clone(), subscription, now)?;

        store.storage.insert(id, created.clone());
        log::info!("Stored subscription {}", created.id);
        Ok(created)
    }

    async fn set_status(
        &self,
        id: &SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Subscription, StorageError> {
        self.update_with(id, |subscription| subscription.status = status)
            .await
    }

    async fn set_renewal_date(
        &self,
        id: &SubscriptionId,
        renewal_date: DateTime<Utc>,
    ) -> Result<Subscription, StorageError> {
        self.update_with(id, |subscription| {
            subscription.renewal_date = Some(renewal_date)
        })
        .await
    }
}
