//! Per-user pending task model and lifecycle helpers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::orchestrator::debounce::DebounceHandle;

/// Follow-up texts that start processing without replacing the inline requirement.
pub const TRIGGER_WORDS: &[&str] = &["开始", "start", "ok", "好"];

/// Whether `text` is exactly one of the trigger words.
///
/// Surrounding whitespace and ASCII case are ignored.
#[must_use]
pub fn is_trigger_word(text: &str) -> bool {
    let normalized = text.trim().to_ascii_lowercase();
    TRIGGER_WORDS.contains(&normalized.as_str())
}

/// Lifecycle state of a user's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for the debounce window or a follow-up.
    Pending,
    /// The pipeline is running.
    Processing,
}

/// The single live task of a user.
#[derive(Debug)]
pub struct PendingTask {
    /// Unique identifier; a replacement task always gets a new one.
    pub task_id: String,
    /// Sender the task belongs to.
    pub user_id: String,
    /// Link extracted from the triggering message.
    pub share_url: String,
    /// Inline requirement text from the triggering message.
    pub share_text: String,
    /// Requirement supplied in a follow-up message.
    pub extra_requirement: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Debounce timer; dropping it cancels the scheduled trigger.
    pub timer: Option<DebounceHandle>,
    /// Set once the pipeline has started.
    pub processing: bool,
}

impl PendingTask {
    /// Construct a pending task with a fresh identifier and no timer.
    #[must_use]
    pub fn new(user_id: String, share_url: String, share_text: String) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            user_id,
            share_url,
            share_text,
            extra_requirement: None,
            created_at: Utc::now(),
            timer: None,
            processing: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        if self.processing {
            TaskState::Processing
        } else {
            TaskState::Pending
        }
    }

    /// Requirement text the pipeline should honour.
    ///
    /// A follow-up overrides the inline text unless it is a bare trigger word.
    #[must_use]
    pub fn effective_requirement(&self) -> Option<String> {
        let chosen = match self.extra_requirement.as_deref() {
            Some(extra) if !extra.trim().is_empty() && !is_trigger_word(extra) => extra,
            _ => self.share_text.as_str(),
        };
        let chosen = chosen.trim();
        (!chosen.is_empty()).then(|| chosen.to_owned())
    }

    /// Cancel the debounce timer, if one is armed.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Snapshot of the fields the task runner needs.
    #[must_use]
    pub fn claim(&self) -> ClaimedTask {
        ClaimedTask {
            task_id: self.task_id.clone(),
            user_id: self.user_id.clone(),
            share_url: self.share_url.clone(),
            requirement: self.effective_requirement(),
        }
    }
}

/// Immutable view of a task that has entered `Processing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    /// Identifier of the claimed task.
    pub task_id: String,
    /// Owner of the task.
    pub user_id: String,
    /// Link to process.
    pub share_url: String,
    /// Requirement text, if any.
    pub requirement: Option<String>,
}
