use std::time::Duration;

use anyhow::anyhow;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::delivery::{NotificationFormatter, RetryPolicy};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://subtrack.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WorkflowSettings {
    /// How often persisted runs are checked for missed wake-ups.
    pub sweep_interval_secs: u64,
    /// Back-off after a subscription store read fails.
    pub store_retry_secs: u64,
}

impl WorkflowSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn store_retry(&self) -> Duration {
        Duration::from_secs(self.store_retry_secs)
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            store_retry_secs: 30,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NotifierSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: u32,
    pub max_backoff_secs: u64,
}

impl NotifierSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.backoff_multiplier,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2000,
            backoff_multiplier: 2,
            max_backoff_secs: 60,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EmailSettings {
    pub from: String,
    /// Reminders are only logged when unset.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            from: "Subscription Tracker <no-reply@localhost>".to_string(),
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DisplaySettings {
    pub timezone: String,
    pub product_name: String,
    pub account_settings_link: String,
    pub support_link: String,
}

impl DisplaySettings {
    pub fn formatter(&self) -> anyhow::Result<NotificationFormatter> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow!("Invalid display timezone {}: {e}", self.timezone))?;

        Ok(NotificationFormatter {
            timezone,
            product_name: self.product_name.clone(),
            account_settings_link: self.account_settings_link.clone(),
            support_link: self.support_link.clone(),
        })
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        let formatter = NotificationFormatter::default();
        Self {
            timezone: formatter.timezone.name().to_string(),
            product_name: formatter.product_name,
            account_settings_link: formatter.account_settings_link,
            support_link: formatter.support_link,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub workflow: WorkflowSettings,
    pub notifier: NotifierSettings,
    pub email: EmailSettings,
    pub display: DisplaySettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
