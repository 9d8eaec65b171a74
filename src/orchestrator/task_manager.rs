//! Per-user task lifecycle.
//!
//! Routes text messages through the [`TaskRegistry`], arms debounce timers,
//! and runs claimed tasks. A run is always followed by cleanup and removal of
//! the task, whether it succeeded, failed, or panicked.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::delivery::{replies, Messenger};
use crate::links::{extract_requirement, extract_url};
use crate::models::task::ClaimedTask;
use crate::Result;

use super::debounce::{DebounceEvent, DebounceHandle, DebounceTimer};
use super::registry::{Admission, SharedLink, TaskRegistry};
use super::task_runner::{ContentSlot, TaskExecutor};

/// Capacity of the debounce event channel.
pub const DEBOUNCE_CHANNEL_CAPACITY: usize = 256;

/// Owns the lifecycle of every user's task.
#[derive(Clone)]
pub struct TaskManager {
    registry: Arc<TaskRegistry>,
    messenger: Arc<dyn Messenger>,
    executor: Arc<dyn TaskExecutor>,
    window: Duration,
    event_tx: mpsc::Sender<DebounceEvent>,
}

impl TaskManager {
    /// Build a manager whose timers report on `event_tx`.
    #[must_use]
    pub fn new(
        registry: Arc<TaskRegistry>,
        messenger: Arc<dyn Messenger>,
        executor: Arc<dyn TaskExecutor>,
        window: Duration,
        event_tx: mpsc::Sender<DebounceEvent>,
    ) -> Self {
        Self {
            registry,
            messenger,
            executor,
            window,
            event_tx,
        }
    }

    /// Registry shared with the HTTP surface.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Number of live tasks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Handle one text message from `user_id`.
    ///
    /// Never fails: internal errors are logged and answered with a generic
    /// busy notice.
    pub async fn handle_text(&self, user_id: &str, content: &str) {
        let admission = self.admit_text(user_id, content);
        self.send_reply(user_id, &admission).await;
    }

    /// Apply the lifecycle transition for one text message.
    ///
    /// Runs synchronously under the registry lock, so messages of one user
    /// are routed in the order this is called. A claimed task is spawned
    /// before returning; no reply is sent.
    #[must_use]
    pub fn admit_text(&self, user_id: &str, content: &str) -> Admission {
        let _span = info_span!("admit_text", user_id).entered();
        let link = extract_url(content).map(|url| SharedLink {
            inline_requirement: extract_requirement(content, &url),
            url,
        });

        let admission = self
            .registry
            .admit(user_id, content, link, |task_id| self.arm(user_id, task_id));

        match &admission {
            Admission::Started { task_id, replaced } => {
                info!(task_id = %task_id, replaced = ?replaced, "pending task created");
            }
            Admission::Claimed(task) => {
                info!(task_id = %task.task_id, "follow-up starts task");
                self.spawn_run(task.clone());
            }
            Admission::Busy => debug!("task already processing"),
            Admission::Help => debug!("no task and no link"),
        }
        admission
    }

    /// Send the reply for `admission`, falling back to a generic busy notice.
    pub async fn send_reply(&self, user_id: &str, admission: &Admission) {
        let span = info_span!("reply", user_id);
        async {
            if let Err(err) = self.reply(user_id, admission).await {
                error!(%err, "failed to reply to message");
                if let Err(err) = self.messenger.send_text(user_id, replies::SYSTEM_BUSY).await {
                    warn!(%err, "failed to send system busy notice");
                }
            }
        }
        .instrument(span)
        .await;
    }

    /// Apply the lifecycle transition for one text message and send its reply.
    ///
    /// # Errors
    ///
    /// Returns the delivery error when the reply cannot be sent. The state
    /// transition has already been applied at that point.
    pub async fn route_text(&self, user_id: &str, content: &str) -> Result<Admission> {
        let admission = self.admit_text(user_id, content);
        self.reply(user_id, &admission).await?;
        Ok(admission)
    }

    async fn reply(&self, user_id: &str, admission: &Admission) -> Result<()> {
        let text = match admission {
            Admission::Started { .. } => replies::ACK,
            Admission::Busy => replies::BUSY,
            Admission::Help => replies::HELP,
            Admission::Claimed(_) => return Ok(()),
        };
        self.messenger.send_text(user_id, text).await
    }

    /// React to a debounce timer that elapsed.
    ///
    /// Returns the run handle when the timer's task was still pending.
    pub fn on_debounce_event(&self, event: DebounceEvent) -> Option<JoinHandle<()>> {
        match event {
            DebounceEvent::Elapsed { user_id, task_id } => {
                if let Some(task) = self.registry.claim(&user_id, &task_id) {
                    info!(user_id = %user_id, task_id = %task_id, "debounce window elapsed, starting task");
                    Some(self.spawn_run(task))
                } else {
                    debug!(user_id = %user_id, task_id = %task_id, "stale debounce event ignored");
                    None
                }
            }
        }
    }

    fn arm(&self, user_id: &str, task_id: &str) -> DebounceHandle {
        DebounceTimer::new(
            user_id.to_owned(),
            task_id.to_owned(),
            self.window,
            self.event_tx.clone(),
        )
        .spawn()
    }

    fn spawn_run(&self, task: ClaimedTask) -> JoinHandle<()> {
        let span = info_span!("task_run", user_id = %task.user_id, task_id = %task.task_id);
        tokio::spawn(
            run_claimed(
                Arc::clone(&self.registry),
                Arc::clone(&self.messenger),
                Arc::clone(&self.executor),
                task,
            )
            .instrument(span),
        )
    }
}

async fn run_claimed(
    registry: Arc<TaskRegistry>,
    messenger: Arc<dyn Messenger>,
    executor: Arc<dyn TaskExecutor>,
    task: ClaimedTask,
) {
    let content = ContentSlot::new();

    // Run on its own task so a panic is observed as a join error.
    let run = {
        let executor = Arc::clone(&executor);
        let task = task.clone();
        let content = content.clone();
        tokio::spawn(async move { executor.execute(&task, &content).await })
    };

    let failure = match run.await {
        Ok(Ok(())) => {
            info!("task completed");
            None
        }
        Ok(Err(err)) => {
            error!(%err, "task failed");
            Some(err.to_string())
        }
        Err(join_err) => {
            error!(%join_err, "task aborted");
            Some(join_err.to_string())
        }
    };

    if let Some(reason) = failure {
        if let Err(err) = messenger
            .send_text(&task.user_id, &replies::failure(&reason))
            .await
        {
            warn!(%err, "failed to report task failure");
        }
    }

    if let Some(content_id) = content.get() {
        executor.cleanup(&content_id).await;
    }
    if !registry.release(&task.user_id, &task.task_id) {
        warn!("task was no longer registered at teardown");
    }
}

/// Spawn the consumer that turns debounce events into task runs.
///
/// Runs until `cancel` fires or the channel closes.
#[must_use]
pub fn spawn_debounce_consumer(
    manager: TaskManager,
    mut rx: mpsc::Receiver<DebounceEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => {
                    info!("debounce consumer shutting down");
                    break;
                }
                maybe_event = rx.recv() => {
                    if let Some(event) = maybe_event { event } else {
                        info!("debounce event channel closed");
                        break;
                    }
                }
            };
            if manager.on_debounce_event(event).is_none() {
                debug!("debounce event did not start a task");
            }
        }
    })
}
