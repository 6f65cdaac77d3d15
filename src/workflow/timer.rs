use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, task::JoinHandle};

use super::registry::RunEvent;

/// Pending wake-up of a run task. Dropping the handle cancels it.
pub(crate) struct ResumeHandle {
    task: JoinHandle<()>,
    resume_at: DateTime<Utc>,
}

impl ResumeHandle {
    pub(crate) fn resume_at(&self) -> DateTime<Utc> {
        self.resume_at
    }
}

impl Drop for ResumeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Sends [`RunEvent::Resume`] once `resume_at` is reached. A target in the
/// past fires immediately.
pub(crate) fn schedule_resume_at(
    resume_at: DateTime<Utc>,
    now: DateTime<Utc>,
    tx: mpsc::Sender<RunEvent>,
) -> ResumeHandle {
    let delay = (resume_at - now).to_std().unwrap_or_default();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(RunEvent::Resume).await;
    });

    ResumeHandle { task, resume_at }
}
