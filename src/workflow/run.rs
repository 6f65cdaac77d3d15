use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::subscription::SubscriptionId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Needs (re-)evaluation against the current subscription record.
    Pending,
    /// Suspended until the checkpoint at the cursor is due.
    Waiting,
    Completed,
    Aborted,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "Pending",
            RunState::Waiting => "Waiting",
            RunState::Completed => "Completed",
            RunState::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RunState::Pending),
            "Waiting" => Ok(RunState::Waiting),
            "Completed" => Ok(RunState::Completed),
            "Aborted" => Ok(RunState::Aborted),
            other => Err(format!("Unknown run state {other}")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AbortReason {
    SubscriptionNotFound,
    Inactive,
    RenewalPassed,
    NothingPending,
    PlanningFailed,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::SubscriptionNotFound => "SubscriptionNotFound",
            AbortReason::Inactive => "Inactive",
            AbortReason::RenewalPassed => "RenewalPassed",
            AbortReason::NothingPending => "NothingPending",
            AbortReason::PlanningFailed => "PlanningFailed",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbortReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SubscriptionNotFound" => Ok(AbortReason::SubscriptionNotFound),
            "Inactive" => Ok(AbortReason::Inactive),
            "RenewalPassed" => Ok(AbortReason::RenewalPassed),
            "NothingPending" => Ok(AbortReason::NothingPending),
            "PlanningFailed" => Ok(AbortReason::PlanningFailed),
            other => Err(format!("Unknown abort reason {other}")),
        }
    }
}

/// Persisted resume point of one reminder workflow.
///
/// Everything the engine needs after a cold restart lives here; the plan itself
/// is re-derived from the subscription record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub subscription_id: SubscriptionId,
    pub state: RunState,
    pub abort_reason: Option<AbortReason>,
    pub next_checkpoint_index: usize,
    pub planned_renewal: Option<DateTime<Utc>>,
    pub resume_at: Option<DateTime<Utc>>,
    pub delivered: u32,
    pub skipped: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn new(subscription_id: SubscriptionId, now: DateTime<Utc>) -> Self {
        Self {
            subscription_id,
            state: RunState::Pending,
            abort_reason: None,
            next_checkpoint_index: 0,
            planned_renewal: None,
            resume_at: None,
            delivered: 0,
            skipped: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        match self.state {
            RunState::Completed => Some(RunOutcome::Completed),
            RunState::Aborted => Some(RunOutcome::Aborted(
                self.abort_reason.unwrap_or(AbortReason::NothingPending),
            )),
            RunState::Pending | RunState::Waiting => None,
        }
    }

    pub(crate) fn wait_for(&mut self, checkpoint_index: usize, fires_at: DateTime<Utc>) {
        self.state = RunState::Waiting;
        self.next_checkpoint_index = checkpoint_index;
        self.resume_at = Some(fires_at);
    }

    pub(crate) fn reevaluate(&mut self) {
        self.state = RunState::Pending;
        self.resume_at = None;
    }

    pub(crate) fn complete(&mut self) {
        self.state = RunState::Completed;
        self.resume_at = None;
    }

    pub(crate) fn abort(&mut self, reason: AbortReason) {
        self.state = RunState::Aborted;
        self.abort_reason = Some(reason);
        self.resume_at = None;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReason),
}
