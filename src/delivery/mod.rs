mod log_notifier;
mod retry;
mod smtp;
pub mod template;

pub use log_notifier::LogNotifier;
pub use retry::{RetryPolicy, RetryingNotifier};
pub use smtp::SmtpNotifier;
pub use template::{NotificationFormatter, RenderedNotification, render};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(to: impl Into<String>, rendered: RenderedNotification) -> Self {
        Self {
            to: to.into(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Worth retrying, e.g. the transport was unreachable.
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError>;
}
