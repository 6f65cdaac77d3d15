use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{storage::StorageError, subscription::SubscriptionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("Subscription {0} has no renewal date")]
    MissingRenewalDate(SubscriptionId),

    #[error(
        "Renewal date {renewal_date} is not after start date {start_date} for subscription {subscription_id}"
    )]
    RenewalNotAfterStart {
        subscription_id: SubscriptionId,
        start_date: DateTime<Utc>,
        renewal_date: DateTime<Utc>,
    },

    #[error("Reminder for {offset_days} days before {renewal_date} is out of range")]
    OutOfRange {
        renewal_date: DateTime<Utc>,
        offset_days: u32,
    },
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Trigger payload has no resolvable subscription id")]
    MissingPayload,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Common(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No workflow run stored for subscription {0}")]
    RunNotFound(SubscriptionId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
