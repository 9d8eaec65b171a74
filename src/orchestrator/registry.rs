//! Registry of per-user tasks.
//!
//! The registry is the sole owner of every [`PendingTask`]. All state
//! transitions happen inside a single lock acquisition so that a racing
//! debounce timer, a follow-up message, and a fresh link can never observe
//! each other half-way. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::task::{ClaimedTask, PendingTask, TaskState};

use super::debounce::DebounceHandle;

/// Link found in an inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLink {
    /// The extracted URL.
    pub url: String,
    /// Remaining text of the message, used as the inline requirement.
    pub inline_requirement: String,
}

/// Routing decision for one inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new pending task was created and its debounce timer armed.
    Started {
        /// Identifier of the new task.
        task_id: String,
        /// Identifier of the pending task it replaced, if any.
        replaced: Option<String>,
    },
    /// The message was a follow-up; the task moved to `Processing`.
    Claimed(ClaimedTask),
    /// The user's task is already processing.
    Busy,
    /// No task and no link: the user needs instructions.
    Help,
}

/// Keyed store of the single live task per user.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, PendingTask>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route a text message for `user_id` and apply the resulting transition.
    ///
    /// `arm` is invoked with the new task id when a task is created and must
    /// return the armed debounce timer for it.
    pub fn admit<F>(
        &self,
        user_id: &str,
        content: &str,
        link: Option<SharedLink>,
        arm: F,
    ) -> Admission
    where
        F: FnOnce(&str) -> DebounceHandle,
    {
        let mut tasks = self.lock();

        let existing_state = tasks.get(user_id).map(PendingTask::state);
        match (existing_state, link) {
            (Some(TaskState::Processing), _) => Admission::Busy,
            (Some(TaskState::Pending), None) => {
                let Some(task) = tasks.get_mut(user_id) else {
                    return Admission::Help;
                };
                task.extra_requirement = Some(content.trim().to_owned());
                task.cancel_timer();
                task.processing = true;
                debug!(user_id, task_id = %task.task_id, "follow-up claimed pending task");
                Admission::Claimed(task.claim())
            }
            (_, Some(link)) => {
                let mut task =
                    PendingTask::new(user_id.to_owned(), link.url, link.inline_requirement);
                task.timer = Some(arm(&task.task_id));
                let task_id = task.task_id.clone();

                // Dropping the replaced task cancels its timer.
                let replaced = tasks
                    .insert(user_id.to_owned(), task)
                    .map(|mut old| {
                        old.cancel_timer();
                        old.task_id
                    });
                Admission::Started { task_id, replaced }
            }
            (None, None) => Admission::Help,
        }
    }

    /// Move the task to `Processing` if it is still the pending task `task_id`.
    ///
    /// Returns `None` when the task was replaced, removed, or already claimed.
    pub fn claim(&self, user_id: &str, task_id: &str) -> Option<ClaimedTask> {
        let mut tasks = self.lock();
        let task = tasks.get_mut(user_id)?;
        if task.task_id != task_id || task.processing {
            return None;
        }
        task.cancel_timer();
        task.processing = true;
        Some(task.claim())
    }

    /// Remove the task `task_id` of `user_id`.
    ///
    /// Returns `false` when no such task is registered.
    pub fn release(&self, user_id: &str, task_id: &str) -> bool {
        let mut tasks = self.lock();
        match tasks.get(user_id) {
            Some(task) if task.task_id == task_id => {
                if let Some(mut task) = tasks.remove(user_id) {
                    task.cancel_timer();
                }
                true
            }
            _ => false,
        }
    }

    /// Lifecycle state of the user's task, if any.
    #[must_use]
    pub fn state(&self, user_id: &str) -> Option<TaskState> {
        self.lock().get(user_id).map(PendingTask::state)
    }

    /// Link of the user's current task, if any.
    #[must_use]
    pub fn share_url(&self, user_id: &str) -> Option<String> {
        self.lock().get(user_id).map(|task| task.share_url.clone())
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no task is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
