use std::time::Duration;

use async_trait::async_trait;

use super::{Notifier, NotifyError, OutboundMessage};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `failed_attempts + 1`.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Bounded retries around another notifier. Only transient failures are
/// retried; the last error is returned once attempts run out.
pub struct RetryingNotifier<N> {
    inner: N,
    policy: RetryPolicy,
}

impl<N: Notifier> RetryingNotifier<N> {
    pub fn new(inner: N, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<N: Notifier> Notifier for RetryingNotifier<N> {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.send(message).await {
                Ok(()) => return Ok(()),
                Err(NotifyError::Transient(reason)) if attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    log::warn!(
                        "Delivery attempt {attempt}/{max_attempts} failed, retrying in {delay:?}. [to = {}, reason = {reason}]",
                        message.to
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
