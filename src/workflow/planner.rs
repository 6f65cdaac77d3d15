use chrono::{DateTime, TimeDelta, Utc};

use crate::subscription::Subscription;

use super::error::PlanningError;

/// Days before renewal at which the owner gets a reminder, earliest first.
pub const REMINDER_OFFSETS: [u32; 4] = [7, 5, 2, 1];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReminderCheckpoint {
    pub offset_days: u32,
    pub fires_at: DateTime<Utc>,
}

/// Full, deterministic checkpoint list for one renewal date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPlan {
    renewal_date: DateTime<Utc>,
    checkpoints: Vec<ReminderCheckpoint>,
}

impl ReminderPlan {
    pub fn for_renewal(renewal_date: DateTime<Utc>) -> Result<Self, PlanningError> {
        let checkpoints = REMINDER_OFFSETS
            .iter()
            .map(|&offset_days| {
                renewal_date
                    .checked_sub_signed(TimeDelta::days(offset_days.into()))
                    .map(|fires_at| ReminderCheckpoint {
                        offset_days,
                        fires_at,
                    })
                    .ok_or(PlanningError::OutOfRange {
                        renewal_date,
                        offset_days,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            renewal_date,
            checkpoints,
        })
    }

    pub fn renewal_date(&self) -> DateTime<Utc> {
        self.renewal_date
    }

    pub fn checkpoints(&self) -> &[ReminderCheckpoint] {
        &self.checkpoints
    }

    pub fn get(&self, index: usize) -> Option<&ReminderCheckpoint> {
        self.checkpoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Index of the earliest checkpoint still in the future, or `len()` when
    /// every checkpoint has passed.
    pub fn first_pending_index(&self, now: DateTime<Utc>) -> usize {
        self.checkpoints
            .iter()
            .position(|checkpoint| checkpoint.fires_at > now)
            .unwrap_or(self.checkpoints.len())
    }

    pub fn pending(&self, now: DateTime<Utc>) -> Vec<ReminderCheckpoint> {
        self.checkpoints[self.first_pending_index(now)..].to_vec()
    }
}

pub fn plan(subscription: &Subscription) -> Result<ReminderPlan, PlanningError> {
    let renewal_date = subscription
        .renewal_date
        .ok_or_else(|| PlanningError::MissingRenewalDate(subscription.id.clone()))?;

    if renewal_date <= subscription.start_date {
        return Err(PlanningError::RenewalNotAfterStart {
            subscription_id: subscription.id.clone(),
            start_date: subscription.start_date,
            renewal_date,
        });
    }

    ReminderPlan::for_renewal(renewal_date)
}

pub fn pending_checkpoints(
    subscription: &Subscription,
    now: DateTime<Utc>,
) -> Result<Vec<ReminderCheckpoint>, PlanningError> {
    Ok(plan(subscription)?.pending(now))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;
    use crate::test_utils::{active_subscription, utc};

    #[test]
    fn plan_lists_all_offsets_in_descending_order() {
        let subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));

        let plan = plan(&subscription).unwrap();
        let checkpoints: Vec<_> = plan
            .checkpoints()
            .iter()
            .map(|c| (c.offset_days, c.fires_at))
            .collect();

        assert_eq!(
            checkpoints,
            vec![
                (7, utc(2024, 1, 25)),
                (5, utc(2024, 1, 27)),
                (2, utc(2024, 1, 30)),
                (1, utc(2024, 1, 31)),
            ]
        );
    }

    #[test]
    fn pending_excludes_passed_checkpoints() {
        let subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));

        let pending = pending_checkpoints(&subscription, utc(2024, 1, 28)).unwrap();

        let offsets: Vec<_> = pending.iter().map(|c| c.offset_days).collect();
        assert_eq!(offsets, vec![2, 1]);
    }

    #[test]
    fn checkpoint_firing_exactly_now_is_not_pending() {
        let plan = ReminderPlan::for_renewal(utc(2024, 2, 1)).unwrap();

        assert_eq!(plan.first_pending_index(utc(2024, 1, 25)), 1);
        assert_eq!(plan.first_pending_index(utc(2024, 2, 1)), plan.len());
        assert!(plan.pending(utc(2024, 2, 1)).is_empty());
    }

    #[test]
    fn plan_rejects_missing_renewal_date() {
        let mut subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));
        subscription.renewal_date = None;

        assert_eq!(
            plan(&subscription),
            Err(PlanningError::MissingRenewalDate("sub-1".to_string()))
        );
    }

    #[test]
    fn plan_rejects_renewal_not_after_start() {
        let subscription = active_subscription("sub-1", utc(2024, 2, 1), utc(2024, 2, 1));

        assert!(matches!(
            plan(&subscription),
            Err(PlanningError::RenewalNotAfterStart { .. })
        ));
    }

    fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
        // 2000-01-01 ..= 2100-01-01
        (946_684_800i64..=4_102_444_800i64)
            .prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[proptest]
    fn pending_is_future_suffix_of_offsets(
        #[strategy(timestamp_strategy())] renewal_date: DateTime<Utc>,
        #[strategy(-10 * 86_400i64..=10 * 86_400i64)] now_offset_secs: i64,
    ) {
        let now = renewal_date - TimeDelta::days(4) + TimeDelta::seconds(now_offset_secs);
        let start_date = renewal_date - TimeDelta::days(30);
        let subscription = active_subscription("sub-1", start_date, renewal_date);

        let pending = pending_checkpoints(&subscription, now).unwrap();

        let expected: Vec<u32> = REMINDER_OFFSETS
            .iter()
            .copied()
            .filter(|&offset| renewal_date - TimeDelta::days(offset.into()) > now)
            .collect();
        let offsets: Vec<u32> = pending.iter().map(|c| c.offset_days).collect();

        prop_assert_eq!(offsets, expected);
        prop_assert!(pending.iter().all(|c| c.fires_at > now));
        prop_assert!(pending.windows(2).all(|w| w[0].fires_at < w[1].fires_at));
    }

    #[proptest]
    fn plan_is_idempotent(#[strategy(timestamp_strategy())] renewal_date: DateTime<Utc>) {
        let subscription =
            active_subscription("sub-1", renewal_date - TimeDelta::days(30), renewal_date);

        prop_assert_eq!(plan(&subscription), plan(&subscription));
    }

    mod any_instant {
        use proptest::prelude::*;
        use proptest_arbitrary_interop::arb;

        use super::super::*;

        proptest! {
            #[test]
            fn plan_never_panics_and_stays_ordered(
                renewal_date in arb::<DateTime<Utc>>(),
                now in arb::<DateTime<Utc>>()
            ) {
                if let Ok(plan) = ReminderPlan::for_renewal(renewal_date) {
                    let cursor = plan.first_pending_index(now);
                    prop_assert!(cursor <= plan.len());
                    prop_assert_eq!(plan.pending(now).len(), plan.len() - cursor);
                    prop_assert!(plan.checkpoints().iter().all(|c| c.fires_at < renewal_date));
                }
            }
        }
    }
}
