use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    appsettings::WorkflowSettings,
    clock::Clock,
    delivery::{NotificationFormatter, Notifier, OutboundMessage},
    storage::{RunStorage, StorageError, SubscriptionStorage},
    subscription::{Subscription, SubscriptionId},
};

use super::{
    error::WorkflowError,
    planner::{self, ReminderCheckpoint},
    run::{AbortReason, RunOutcome, RunState, WorkflowRun},
};

/// What the caller should do with a run after [`ReminderWorkflow::advance`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    SuspendUntil(DateTime<Utc>),
    Finished(RunOutcome),
}

enum Step {
    Continue,
    Suspend(DateTime<Utc>),
    Finished,
}

/// Drives persisted reminder runs through their state machine.
///
/// The engine holds no per-run memory. Every call to `advance` starts from the
/// stored run and the current subscription record.
pub struct ReminderWorkflow {
    subscriptions: Arc<dyn SubscriptionStorage>,
    runs: Arc<dyn RunStorage>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    formatter: NotificationFormatter,
    store_retry: TimeDelta,
}

impl ReminderWorkflow {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStorage>,
        runs: Arc<dyn RunStorage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        formatter: NotificationFormatter,
        settings: &WorkflowSettings,
    ) -> Self {
        Self {
            subscriptions,
            runs,
            notifier,
            clock,
            formatter,
            store_retry: TimeDelta::from_std(settings.store_retry())
                .unwrap_or(TimeDelta::days(1))
                .max(TimeDelta::seconds(1)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn runs(&self) -> &dyn RunStorage {
        self.runs.as_ref()
    }

    /// Persists a fresh run for the subscription unless a live one already
    /// exists, and returns the run that should be advanced.
    pub async fn begin(&self, id: &SubscriptionId) -> Result<WorkflowRun, WorkflowError> {
        match self.runs.get(id).await? {
            Some(run) if !run.is_terminal() => {
                log::info!(
                    "Workflow already running. [subscription_id = {id}, state = {}]",
                    run.state
                );
                return Ok(run);
            }
            _ => {}
        }

        let run = WorkflowRun::new(id.clone(), self.clock.now());
        self.runs.save(&run).await?;
        log::info!("Workflow started. [subscription_id = {id}]");

        Ok(run)
    }

    /// Applies transitions until the run suspends or finishes, saving after each.
    pub async fn advance(&self, id: &SubscriptionId) -> Result<Decision, WorkflowError> {
        let mut run = self
            .runs
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::RunNotFound(id.clone()))?;

        loop {
            if let Some(outcome) = run.outcome() {
                return Ok(Decision::Finished(outcome));
            }

            let now = self.clock.now();
            let step = match run.state {
                RunState::Pending => self.evaluate(&mut run, now).await,
                RunState::Waiting => self.deliver(&mut run, now).await,
                RunState::Completed | RunState::Aborted => Step::Finished,
            };

            run.updated_at = now;
            self.runs.save(&run).await?;

            match step {
                Step::Continue | Step::Finished => continue,
                Step::Suspend(resume_at) => {
                    log::info!(
                        "Workflow suspended. [subscription_id = {id}, state = {}, resume_at = {resume_at}]",
                        run.state
                    );
                    return Ok(Decision::SuspendUntil(resume_at));
                }
            }
        }
    }

    async fn evaluate(&self, run: &mut WorkflowRun, now: DateTime<Utc>) -> Step {
        let subscription = match self.read_subscription(run, now).await {
            Ok(subscription) => subscription,
            Err(step) => return step,
        };
        let id = &subscription.id;

        if !subscription.is_active() {
            log::info!(
                "Subscription is not active, stopping reminders. [subscription_id = {id}, status = {}]",
                subscription.status
            );
            run.abort(AbortReason::Inactive);
            return Step::Finished;
        }

        if subscription.renewal_date.is_some_and(|renewal| renewal <= now) {
            log::info!("Renewal date has passed. [subscription_id = {id}]");
            run.abort(AbortReason::RenewalPassed);
            return Step::Finished;
        }

        let plan = match planner::plan(&subscription) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Could not plan reminders. [subscription_id = {id}, error = {e}]");
                run.abort(AbortReason::PlanningFailed);
                return Step::Finished;
            }
        };

        if run.planned_renewal != Some(plan.renewal_date()) {
            let cursor = plan.first_pending_index(now);
            log::info!(
                "Planned reminders. [subscription_id = {id}, renewal_date = {}, pending = {}]",
                plan.renewal_date(),
                plan.len() - cursor
            );
            run.next_checkpoint_index = cursor;
            run.planned_renewal = Some(plan.renewal_date());
        }

        match plan.get(run.next_checkpoint_index) {
            Some(checkpoint) => self.wait_for(run, *checkpoint, now),
            None => {
                log::info!("No reminders left to send. [subscription_id = {id}]");
                run.abort(AbortReason::NothingPending);
                Step::Finished
            }
        }
    }

    async fn deliver(&self, run: &mut WorkflowRun, now: DateTime<Utc>) -> Step {
        let subscription = match self.read_subscription(run, now).await {
            Ok(subscription) => subscription,
            Err(step) => return step,
        };
        let id = &subscription.id;

        if !subscription.is_active() {
            log::info!(
                "Subscription is no longer active, skipping remaining reminders. [subscription_id = {id}, status = {}]",
                subscription.status
            );
            run.abort(AbortReason::Inactive);
            return Step::Finished;
        }

        // A passed renewal is not checked here: a due checkpoint of the current
        // plan still fires once, even when the process woke up late.
        if subscription.renewal_date != run.planned_renewal {
            log::info!("Renewal date changed, re-planning. [subscription_id = {id}]");
            run.reevaluate();
            return Step::Continue;
        }

        let plan = match planner::plan(&subscription) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Could not plan reminders. [subscription_id = {id}, error = {e}]");
                run.abort(AbortReason::PlanningFailed);
                return Step::Finished;
            }
        };

        let Some(checkpoint) = plan.get(run.next_checkpoint_index).copied() else {
            run.complete();
            return Step::Finished;
        };

        if now < checkpoint.fires_at {
            return self.wait_for(run, checkpoint, now);
        }

        if self.notify(&subscription, checkpoint).await {
            run.delivered += 1;
        } else {
            run.skipped += 1;
        }

        let next = run.next_checkpoint_index + 1;
        match plan.get(next) {
            Some(next_checkpoint) => {
                run.next_checkpoint_index = next;
                self.wait_for(run, *next_checkpoint, now)
            }
            None => {
                run.next_checkpoint_index = next;
                log::info!(
                    "All reminders processed. [subscription_id = {id}, delivered = {}, skipped = {}]",
                    run.delivered,
                    run.skipped
                );
                run.complete();
                Step::Finished
            }
        }
    }

    /// Returns whether the reminder reached the notifier successfully.
    async fn notify(&self, subscription: &Subscription, checkpoint: ReminderCheckpoint) -> bool {
        let id = &subscription.id;
        let offset_days = checkpoint.offset_days;

        let email = subscription.user.email.trim();
        if email.is_empty() {
            log::warn!(
                "Subscription owner has no email, skipping reminder. [subscription_id = {id}, offset_days = {offset_days}]"
            );
            return false;
        }

        let rendered = self.formatter.render(subscription, offset_days);
        let message = OutboundMessage::new(email, rendered);

        match self.notifier.send(&message).await {
            Ok(()) => {
                log::info!("Reminder sent. [subscription_id = {id}, offset_days = {offset_days}]");
                true
            }
            Err(e) => {
                log::error!(
                    "Reminder delivery failed, moving on. [subscription_id = {id}, offset_days = {offset_days}, error = {e}]"
                );
                false
            }
        }
    }

    fn wait_for(
        &self,
        run: &mut WorkflowRun,
        checkpoint: ReminderCheckpoint,
        now: DateTime<Utc>,
    ) -> Step {
        run.wait_for(run.next_checkpoint_index, checkpoint.fires_at);
        if checkpoint.fires_at > now {
            Step::Suspend(checkpoint.fires_at)
        } else {
            Step::Continue
        }
    }

    async fn read_subscription(
        &self,
        run: &mut WorkflowRun,
        now: DateTime<Utc>,
    ) -> Result<Subscription, Step> {
        let id = &run.subscription_id;
        match self.subscriptions.get(id).await {
            Ok(subscription) => Ok(subscription),
            Err(StorageError::NotFound(_)) => {
                log::warn!("Subscription not found, stopping workflow. [subscription_id = {id}]");
                run.abort(AbortReason::SubscriptionNotFound);
                Err(Step::Finished)
            }
            Err(e) => {
                let retry_at = now.checked_add_signed(self.store_retry).unwrap_or(now);
                log::warn!(
                    "Could not read subscription, retrying later. [subscription_id = {id}, retry_at = {retry_at}, error = {e}]"
                );
                run.resume_at = Some(retry_at);
                Err(Step::Suspend(retry_at))
            }
        }
    }
}
