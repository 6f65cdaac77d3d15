use async_trait::async_trait;

use super::{Notifier, NotifyError, OutboundMessage};

/// Writes reminders to the log instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        log::info!(
            "Reminder email (not sent, no SMTP configured). [to = {}, subject = {}]\n{}",
            message.to,
            message.subject,
            message.text
        );
        Ok(())
    }
}
