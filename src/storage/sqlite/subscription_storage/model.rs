use chrono::{DateTime, Utc};

use crate::{
    storage::StorageError,
    subscription::{Price, Subscription, SubscriptionOwner},
};

#[derive(sqlx::FromRow)]
pub struct SubscriptionStorageModel {
    pub id: String,
    pub name: String,
    pub price_minor: i64,
    pub currency: String,
    pub frequency: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub renewal_date: Option<DateTime<Utc>>,
    pub payment_method: String,
    pub user_name: String,
    pub user_email: String,
}

impl From<Subscription> for SubscriptionStorageModel {
    fn from(value: Subscription) -> Self {
        Self {
            id: value.id,
            name: value.name,
            price_minor: value.price.minor_units(),
            currency: value.currency,
            frequency: value.frequency.as_str().to_string(),
            status: value.status.as_str().to_string(),
            start_date: value.start_date,
            renewal_date: value.renewal_date,
            payment_method: value.payment_method,
            user_name: value.user.name,
            user_email: value.user.email,
        }
    }
}

impl TryFrom<SubscriptionStorageModel> for Subscription {
    type Error = StorageError;

    fn try_from(value: SubscriptionStorageModel) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::subscription::SubscriptionError| {
            StorageError::Corrupt(format!("subscription {}: {e}", value.id))
        };
        let frequency = value.frequency.parse().map_err(corrupt)?;
        let status = value.status.parse().map_err(corrupt)?;

        Ok(Self {
            id: value.id,
            name: value.name,
            price: Price::from_minor_units(value.price_minor),
            currency: value.currency,
            frequency,
            status,
            start_date: value.start_date,
            renewal_date: value.renewal_date,
            payment_method: value.payment_method,
            user: SubscriptionOwner {
                name: value.user_name,
                email: value.user_email,
            },
        })
    }
}
