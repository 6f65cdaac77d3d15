use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{
    sync::{RwLock, mpsc, mpsc::error::TrySendError},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::{appsettings::WorkflowSettings, subscription::SubscriptionId};

use super::{
    engine::{Decision, ReminderWorkflow},
    error::{TriggerError, WorkflowError},
    timer::{ResumeHandle, schedule_resume_at},
    trigger::TriggerPayload,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) enum RunEvent {
    Resume,
    Stop,
}

struct RunHandle {
    task: JoinHandle<()>,
    tx: mpsc::Sender<RunEvent>,
}

type RunTaskStore = RwLock<HashMap<SubscriptionId, RunHandle>>;

struct Shared {
    workflow: Arc<ReminderWorkflow>,
    tasks: RunTaskStore,
}

/// Owns one task per live run and keeps them woken on time.
pub struct WorkflowRegistry {
    shared: Arc<Shared>,
    sweep: CancellationToken,
}

impl WorkflowRegistry {
    pub fn new(workflow: Arc<ReminderWorkflow>, settings: &WorkflowSettings) -> Self {
        let shared = Arc::new(Shared {
            workflow,
            tasks: RwLock::new(HashMap::new()),
        });
        let sweep = CancellationToken::new();
        spawn_sweep_task(Arc::clone(&shared), sweep.child_token(), settings.sweep_interval());

        Self { shared, sweep }
    }

    /// Starts a run from a "subscription created" payload.
    pub async fn trigger(&self, payload: &Value) -> Result<SubscriptionId, TriggerError> {
        let id = TriggerPayload::from_json(payload)?;
        self.start(&id).await.map_err(|e| match e {
            WorkflowError::Storage(e) => TriggerError::Storage(e),
            other => TriggerError::Common(other.into()),
        })?;

        Ok(id)
    }

    pub async fn start(&self, id: &SubscriptionId) -> Result<(), WorkflowError> {
        self.shared.workflow.begin(id).await?;
        wake(&self.shared, id).await;
        Ok(())
    }

    /// Wakes every persisted run that has not finished, e.g. after a restart.
    pub async fn recover(&self) -> anyhow::Result<usize> {
        let runs = self.shared.workflow.runs().list_active().await?;
        for run in &runs {
            wake(&self.shared, &run.subscription_id).await;
        }

        log::info!("Recovered {} unfinished workflow runs", runs.len());
        Ok(runs.len())
    }

    /// Stops the sweep and all run tasks. Persisted runs are left as they are
    /// so a later `recover` picks them up again.
    pub async fn shutdown(&self) {
        self.sweep.cancel();

        let handles: Vec<_> = self.shared.tasks.write().await.drain().collect();
        for (id, mut handle) in handles {
            let _ = handle.tx.try_send(RunEvent::Stop);
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle.task)
                .await
                .is_err()
            {
                log::warn!("Run task did not stop in time, aborting. [subscription_id = {id}]");
                handle.task.abort();
            }
        }

        log::info!("Workflow registry stopped");
    }
}

impl Drop for WorkflowRegistry {
    fn drop(&mut self) {
        self.sweep.cancel();
    }
}

/// Delivers a wake-up to the run's task, starting one if none is alive.
async fn wake(shared: &Arc<Shared>, id: &SubscriptionId) {
    let mut tasks = shared.tasks.write().await;

    if let Some(handle) = tasks.get(id) {
        match handle.tx.try_send(RunEvent::Resume) {
            // A full queue already holds a wake-up.
            Ok(()) | Err(TrySendError::Full(_)) => return,
            Err(TrySendError::Closed(_)) => {}
        }
    }

    tasks.insert(id.clone(), spawn_run_task(Arc::clone(shared), id.clone()));
}

fn spawn_run_task(shared: Arc<Shared>, id: SubscriptionId) -> RunHandle {
    log::info!("Starting task for workflow run. [subscription_id = {id}]");
    let (tx, rx) = mpsc::channel(10);
    // The channel is empty, so the first wake-up always fits.
    let _ = tx.try_send(RunEvent::Resume);

    let task_tx = tx.clone();
    let task = task::spawn(async move {
        run_workflow(shared, id, rx, task_tx).await;
    });

    RunHandle { task, tx }
}

async fn run_workflow(
    shared: Arc<Shared>,
    id: SubscriptionId,
    mut rx: mpsc::Receiver<RunEvent>,
    tx: mpsc::Sender<RunEvent>,
) {
    let workflow = &shared.workflow;
    let mut _timer: Option<ResumeHandle> = None;

    while let Some(event) = rx.recv().await {
        if matches!(event, RunEvent::Stop) {
            log::info!("Run task stopped. [subscription_id = {id}]");
            break;
        }

        match workflow.advance(&id).await {
            Ok(Decision::SuspendUntil(resume_at)) => {
                // Replacing the handle cancels the previous wake-up.
                let handle = schedule_resume_at(resume_at, workflow.now(), tx.clone());
                log::debug!(
                    "Wake-up scheduled. [subscription_id = {id}, resume_at = {}]",
                    handle.resume_at()
                );
                _timer = Some(handle);
            }
            Ok(Decision::Finished(outcome)) => {
                _timer = None;
                log::info!("Workflow finished. [subscription_id = {id}, outcome = {outcome:?}]");
                // A restart of the same subscription may have queued another wake-up.
                if close_if_idle(&shared, &mut rx).await {
                    break;
                }
            }
            Err(e) => {
                _timer = None;
                log::error!("Workflow run failed. [subscription_id = {id}, error = {e}]");
                if close_if_idle(&shared, &mut rx).await {
                    break;
                }
            }
        }
    }
}

/// Closes the run's queue unless a wake-up is already waiting in it.
///
/// `wake` sends while holding the task map lock, so under that lock the check
/// and the close see the same queue. Any later wake-up finds the queue closed
/// and starts a fresh task.
async fn close_if_idle(shared: &Shared, rx: &mut mpsc::Receiver<RunEvent>) -> bool {
    let _tasks = shared.tasks.write().await;
    if rx.is_empty() {
        rx.close();
        true
    } else {
        false
    }
}

fn spawn_sweep_task(shared: Arc<Shared>, token: CancellationToken, every: Duration) {
    task::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(every) => {
                    sweep(&shared).await;
                }
                _ = token.cancelled() => {
                    log::info!("Sweep task shutting down");
                    break;
                }
            };
        }
    });
}

/// Wakes runs whose resume time has passed and drops handles of finished tasks.
async fn sweep(shared: &Arc<Shared>) {
    let now = shared.workflow.now();
    match shared.workflow.runs().list_due(now).await {
        Ok(due) => {
            for run in due {
                wake(shared, &run.subscription_id).await;
            }
        }
        Err(e) => log::error!("Could not list due workflow runs. [error = {e}]"),
    }

    let mut tasks = shared.tasks.write().await;
    let before = tasks.len();
    tasks.retain(|_, handle| !handle.task.is_finished());
    let after = tasks.len();

    if before != after {
        log::info!("Cleaned up {} finished run tasks", before - after);
    }
}
