use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::{
    delivery::{Notifier, NotifyError, OutboundMessage},
    subscription::{Frequency, Price, Subscription, SubscriptionOwner, SubscriptionStatus},
};

pub fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn active_subscription(
    id: &str,
    start_date: DateTime<Utc>,
    renewal_date: DateTime<Utc>,
) -> Subscription {
    Subscription {
        id: id.to_string(),
        name: "Streaming".to_string(),
        price: Price::from_minor_units(1599),
        currency: "USD".to_string(),
        frequency: Frequency::Monthly,
        status: SubscriptionStatus::Active,
        start_date,
        renewal_date: Some(renewal_date),
        payment_method: "Credit Card".to_string(),
        user: SubscriptionOwner {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
        },
    }
}

pub fn message_to(to: &str) -> OutboundMessage {
    OutboundMessage {
        to: to.to_string(),
        subject: "Streaming renews on February 1, 2024".to_string(),
        html: "<p>hi</p>".to_string(),
        text: "hi".to_string(),
    }
}

enum Behaviour {
    FailTimes(u32),
    Reject,
}

/// Notifier double that records every successful send.
pub struct RecordingNotifier {
    behaviour: Behaviour,
    attempts: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::failing_times(0)
    }

    /// Fails transiently `failures` times, then succeeds.
    pub fn failing_times(failures: u32) -> Self {
        Self {
            behaviour: Behaviour::FailTimes(failures),
            attempts: Arc::new(AtomicU32::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            behaviour: Behaviour::Reject,
            ..Self::new()
        }
    }

    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }

    pub fn sent(&self) -> Arc<Mutex<Vec<OutboundMessage>>> {
        self.sent.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behaviour {
            Behaviour::Reject => Err(NotifyError::Rejected("mailbox unavailable".to_string())),
            Behaviour::FailTimes(failures) if attempt <= failures => {
                Err(NotifyError::Transient("connection refused".to_string()))
            }
            Behaviour::FailTimes(_) => {
                self.sent.lock().unwrap().push(message.clone());
                Ok(())
            }
        }
    }
}

/// Days-before-renewal of each recorded message, read back from the text body.
pub fn sent_offsets(sent: &Mutex<Vec<OutboundMessage>>) -> Vec<u32> {
    sent.lock()
        .unwrap()
        .iter()
        .filter_map(|message| {
            message
                .text
                .lines()
                .find_map(|line| line.strip_prefix("Days until renewal: "))
                .and_then(|days| days.parse().ok())
        })
        .collect()
}
