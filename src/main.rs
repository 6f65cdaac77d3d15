use std::sync::Arc;

use anyhow::Context;
use subtrack::{
    appsettings::Settings,
    clock::SystemClock,
    delivery::{LogNotifier, Notifier, RetryingNotifier, SmtpNotifier},
    storage::sqlite::{self, SqliteRunStorage, SqliteSubscriptionStorage},
    workflow::{ReminderWorkflow, TriggerPayload, WorkflowRegistry},
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = Settings::load().context("Failed to load settings")?;
    log::info!("Starting subscription reminder workflow");

    let pool = sqlite::connect(&settings.database.url, settings.database.max_connections).await?;
    let subscriptions = Arc::new(SqliteSubscriptionStorage::new(pool.clone()));
    let runs = Arc::new(SqliteRunStorage::new(pool));

    let retry_policy = settings.notifier.retry_policy();
    let notifier: Arc<dyn Notifier> = match &settings.email.smtp_host {
        Some(host) => Arc::new(RetryingNotifier::new(
            SmtpNotifier::new(&settings.email, host)?,
            retry_policy,
        )),
        None => {
            log::warn!("No SMTP host configured, reminders will only be logged");
            Arc::new(RetryingNotifier::new(LogNotifier, retry_policy))
        }
    };

    let workflow = Arc::new(ReminderWorkflow::new(
        subscriptions,
        runs,
        notifier,
        Arc::new(SystemClock),
        settings.display.formatter()?,
        &settings.workflow,
    ));
    let registry = WorkflowRegistry::new(workflow, &settings.workflow);
    registry.recover().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => handle_trigger(&registry, &line).await,
                    // Stdin closed; keep serving scheduled reminders.
                    None => {
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    log::info!("Shutting down");
    registry.shutdown().await;

    Ok(())
}

async fn handle_trigger(registry: &WorkflowRegistry, line: &str) {
    let id = match TriggerPayload::parse(line) {
        Ok(id) => id,
        Err(e) => {
            log::warn!("Dropping trigger. [payload = {line}, error = {e}]");
            return;
        }
    };

    if let Err(e) = registry.start(&id).await {
        log::error!("Could not start workflow. [subscription_id = {id}, error = {e}]");
    }
}
