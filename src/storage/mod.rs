mod run_storage;
pub mod sqlite;
mod subscription_storage;

pub use run_storage::{InMemoryRunStorage, RunStorage};
pub use subscription_storage::{InMemorySubscriptionStorage, SubscriptionStorage};

use thiserror::Error;

use crate::subscription::{SubscriptionError, SubscriptionId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Subscription {0} not found")]
    NotFound(SubscriptionId),

    #[error(transparent)]
    Invalid(#[from] SubscriptionError),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
