//! Per-task debounce timer.
//!
//! A [`DebounceTimer`] sleeps for the configured window and then emits a
//! [`DebounceEvent::Elapsed`] on the shared `mpsc` channel, unless it was
//! cancelled first. The returned [`DebounceHandle`] cancels the timer
//! explicitly or when dropped, so replacing or removing a task is enough to
//! silence its timer.
//!
//! Firing only *reports* that the window elapsed. Whether the task is still
//! eligible to start is re-checked by the consumer against the registry.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Events emitted by debounce timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceEvent {
    /// The debounce window of a task elapsed without cancellation.
    Elapsed {
        /// Owner of the task.
        user_id: String,
        /// Task the timer was armed for.
        task_id: String,
    },
}

/// Builder for a single debounce timer.
///
/// Call [`spawn`](Self::spawn) to start the background sleep.
pub struct DebounceTimer {
    user_id: String,
    task_id: String,
    window: Duration,
    event_tx: mpsc::Sender<DebounceEvent>,
}

impl DebounceTimer {
    /// Construct a timer (does not start it yet).
    #[must_use]
    pub fn new(
        user_id: String,
        task_id: String,
        window: Duration,
        event_tx: mpsc::Sender<DebounceEvent>,
    ) -> Self {
        Self {
            user_id,
            task_id,
            window,
            event_tx,
        }
    }

    /// Spawn the background sleep and return a handle controlling it.
    #[must_use]
    pub fn spawn(self) -> DebounceHandle {
        let cancel = CancellationToken::new();
        tokio::spawn(
            Self::run(
                self.user_id,
                self.task_id,
                self.window,
                self.event_tx,
                cancel.clone(),
            )
            .instrument(info_span!("debounce_timer")),
        );

        DebounceHandle { cancel }
    }

    async fn run(
        user_id: String,
        task_id: String,
        window: Duration,
        event_tx: mpsc::Sender<DebounceEvent>,
        cancel: CancellationToken,
    ) {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(user_id = %user_id, task_id = %task_id, "debounce timer cancelled");
            }
            () = tokio::time::sleep(window) => {
                if cancel.is_cancelled() {
                    return;
                }
                info!(user_id = %user_id, task_id = %task_id, window_secs = window.as_secs(), "debounce window elapsed");
                if let Err(err) = event_tx.send(DebounceEvent::Elapsed { user_id, task_id }).await {
                    warn!(%err, "debounce event dropped, consumer is gone");
                }
            }
        }
    }
}

/// Handle returned from [`DebounceTimer::spawn`].
#[derive(Debug)]
pub struct DebounceHandle {
    cancel: CancellationToken,
}

impl Drop for DebounceHandle {
    /// Cancel the timer when the owning task record goes away.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl DebounceHandle {
    /// Cancel the timer. Idempotent; a no-op after the timer fired.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
