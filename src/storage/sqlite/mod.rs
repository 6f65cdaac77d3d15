pub mod run_storage;
pub mod subscription_storage;

pub use run_storage::SqliteRunStorage;
pub use subscription_storage::SqliteSubscriptionStorage;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options: SqliteConnectOptions = database_url.parse()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options.create_if_missing(true))
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Connected to {database_url} and applied migrations");

    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // One connection, otherwise every connection sees its own empty database.
    connect("sqlite::memory:", 1).await.unwrap()
}
