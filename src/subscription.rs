use std::{fmt, str::FromStr};

use chrono::{DateTime, Months, TimeDelta, Utc};
use thiserror::Error;

pub type SubscriptionId = String;

const NAME_MIN_LEN: usize = 3;
const NAME_MAX_LEN: usize = 30;
/// Upper price bound in major units of any currency.
const PRICE_MAX_MAJOR_UNITS: i64 = 10_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Human readable plan name, e.g. `Monthly`.
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
        }
    }

    /// Adds one interval using calendar arithmetic.
    ///
    /// Monthly and yearly steps clamp to the last day of the target month, so
    /// Jan 31 + 1 month is Feb 29 in a leap year and Feb 28 otherwise.
    pub fn add_to(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Frequency::Daily => start.checked_add_signed(TimeDelta::days(1)),
            Frequency::Weekly => start.checked_add_signed(TimeDelta::days(7)),
            Frequency::Monthly => start.checked_add_months(Months::new(1)),
            Frequency::Yearly => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(SubscriptionError::UnknownFrequency(other.to_string())),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(SubscriptionError::UnknownStatus(other.to_string())),
        }
    }
}

/// Number of minor-unit digits of an ISO currency code. Unknown codes are
/// treated like most currencies, with two.
pub fn minor_digits(currency: &str) -> u32 {
    match currency.trim().to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" => 0,
        _ => 2,
    }
}

/// Price in minor units of the subscription currency (cents for USD).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Price(i64);

impl Price {
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOwner {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub name: String,
    pub price: Price,
    pub currency: String,
    pub frequency: Frequency,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub renewal_date: Option<DateTime<Utc>>,
    pub payment_method: String,
    pub user: SubscriptionOwner,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Builds a stored subscription from creation input.
    ///
    /// Resolves a missing renewal date from the start date and frequency and
    /// marks an already lapsed subscription as expired.
    pub fn create(
        id: SubscriptionId,
        new_subscription: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Self, SubscriptionError> {
        let NewSubscription {
            name,
            price,
            currency,
            frequency,
            start_date,
            renewal_date,
            payment_method,
            user,
        } = new_subscription;

        let name = name.trim().to_string();
        let name_len = name.chars().count();
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
            return Err(SubscriptionError::InvalidName(name));
        }

        let max_minor_units = PRICE_MAX_MAJOR_UNITS * 10i64.pow(minor_digits(&currency));
        if !(0..=max_minor_units).contains(&price.minor_units()) {
            return Err(SubscriptionError::InvalidPrice {
                minor_units: price.minor_units(),
                currency,
            });
        }

        let renewal_date = match renewal_date {
            Some(renewal_date) => renewal_date,
            None => derive_renewal_date(start_date, frequency)
                .ok_or(SubscriptionError::RenewalOutOfRange(start_date))?,
        };

        if renewal_date <= start_date {
            return Err(SubscriptionError::RenewalNotAfterStart {
                start_date,
                renewal_date,
            });
        }

        let status = if renewal_date <= now {
            SubscriptionStatus::Expired
        } else {
            SubscriptionStatus::Active
        };

        Ok(Self {
            id,
            name,
            price,
            currency,
            frequency,
            status,
            start_date,
            renewal_date: Some(renewal_date),
            payment_method: payment_method.trim().to_string(),
            user,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub price: Price,
    pub currency: String,
    pub frequency: Frequency,
    pub start_date: DateTime<Utc>,
    pub renewal_date: Option<DateTime<Utc>>,
    pub payment_method: String,
    pub user: SubscriptionOwner,
}

pub fn derive_renewal_date(start: DateTime<Utc>, frequency: Frequency) -> Option<DateTime<Utc>> {
    frequency.add_to(start)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Subscription name must be 3 to 30 characters long, got {0:?}")]
    InvalidName(String),

    #[error(
        "Subscription price must be between 0 and 10000 {currency}, got {minor_units} minor units"
    )]
    InvalidPrice { minor_units: i64, currency: String },

    #[error("Renewal date {renewal_date} must be after start date {start_date}")]
    RenewalNotAfterStart {
        start_date: DateTime<Utc>,
        renewal_date: DateTime<Utc>,
    },

    #[error("Renewal date cannot be derived from start date {0}")]
    RenewalOutOfRange(DateTime<Utc>),

    #[error("Unknown subscription frequency {0}")]
    UnknownFrequency(String),

    #[error("Unknown subscription status {0}")]
    UnknownStatus(String),
}
