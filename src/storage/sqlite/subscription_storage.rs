mod model;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::SubscriptionStorageModel;

use crate::{
    storage::{StorageError, SubscriptionStorage},
    subscription::{NewSubscription, Subscription, SubscriptionId, SubscriptionStatus},
};

pub struct SqliteSubscriptionStorage {
    pool: sqlx::SqlitePool,
}

impl SqliteSubscriptionStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStorage for SqliteSubscriptionStorage {
    async fn get(&self, id: &SubscriptionId) -> Result<Subscription, StorageError> {
        let subscription = sqlx::query_as::<_, SubscriptionStorageModel>(
            "SELECT * FROM subscriptions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        subscription.try_into()
    }

    async fn insert(
        &self,
        subscription: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, StorageError> {
        let id: String = sqlx::query_scalar("SELECT lower(hex(randomblob(16)))")
            .fetch_one(&self.pool)
            .await?;
        let SubscriptionStorageModel {
            id,
            name,
            price_minor,
            currency,
            frequency,
            status,
            start_date,
            renewal_date,
            payment_method,
            user_name,
            user_email,
        } = Subscription::create(id, subscription, now)?.into();

        let created = sqlx::query_as::<_, SubscriptionStorageModel>(
            "
INSERT INTO subscriptions (id, name, price_minor, currency, frequency, status,
                           start_date, renewal_date, payment_method, user_name, user_email)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
",
        )
        .bind(id)
        .bind(name)
        .bind(price_minor)
        .bind(currency)
        .bind(frequency)
        .bind(status)
        .bind(start_date)
        .bind(renewal_date)
        .bind(payment_method)
        .bind(user_name)
        .bind(user_email)
        .fetch_one(&self.pool)
        .await?;

        created.try_into()
    }

    async fn set_status(
        &self,
        id: &SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Subscription, StorageError> {
        let updated = sqlx::query_as::<_, SubscriptionStorageModel>(
            "UPDATE subscriptions SET status = ? WHERE id = ? RETURNING *",
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        updated.try_into()
    }

    async fn set_renewal_date(
        &self,
        id: &SubscriptionId,
        renewal_date: DateTime<Utc>,
    ) -> Result<Subscription, StorageError> {
        let updated = sqlx::query_as::<_, SubscriptionStorageModel>(
            "UPDATE subscriptions SET renewal_date = ? WHERE id = ? RETURNING *",
        )
        .bind(renewal_date)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        updated.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::sqlite::memory_pool,
        subscription::{Frequency, Price, SubscriptionOwner},
        test_utils::utc,
    };

    fn new_subscription() -> NewSubscription {
        NewSubscription {
            name: "Gym".to_string(),
            price: Price::from_minor_units(4500),
            currency: "GBP".to_string(),
            frequency: Frequency::Yearly,
            start_date: utc(2024, 2, 29),
            renewal_date: None,
            payment_method: "Debit".to_string(),
            user: SubscriptionOwner {
                name: "Lin".to_string(),
                email: "lin@example.com".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn inserted_subscription_reads_back() {
        let storage = SqliteSubscriptionStorage::new(memory_pool().await);

        let created = storage
            .insert(new_subscription(), utc(2024, 1, 1))
            .await
            .unwrap();
        let stored = storage.get(&created.id).await.unwrap();

        assert_eq!(stored, created);
        assert_eq!(stored.renewal_date, Some(utc(2025, 2, 28)));
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.user.email, "lin@example.com");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let storage = SqliteSubscriptionStorage::new(memory_pool().await);

        let result = storage.get(&"missing".to_string()).await;

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn status_and_renewal_updates_persist() {
        let storage = SqliteSubscriptionStorage::new(memory_pool().await);
        let created = storage
            .insert(new_subscription(), utc(2024, 1, 1))
            .await
            .unwrap();

        storage
            .set_status(&created.id, SubscriptionStatus::Cancelled)
            .await
            .unwrap();
        let updated = storage
            .set_renewal_date(&created.id, utc(2025, 3, 1))
            .await
            .unwrap();

        assert_eq!(updated.status, SubscriptionStatus::Cancelled);
        assert_eq!(updated.renewal_date, Some(utc(2025, 3, 1)));
        assert!(matches!(
            storage
                .set_status(&"missing".to_string(), SubscriptionStatus::Expired)
                .await,
            Err(StorageError::NotFound(_))
        ));
    }
}
