//! Durable reminder workflow: planning, the per-run state machine and the
//! registry that keeps runs woken across restarts.

mod engine;
mod error;
pub mod planner;
mod registry;
mod run;
mod timer;
mod trigger;

pub use engine::{Decision, ReminderWorkflow};
pub use error::{PlanningError, TriggerError, WorkflowError};
pub use planner::{REMINDER_OFFSETS, ReminderCheckpoint, ReminderPlan, pending_checkpoints, plan};
pub use registry::WorkflowRegistry;
pub use run::{AbortReason, RunOutcome, RunState, WorkflowRun};
pub use trigger::TriggerPayload;
