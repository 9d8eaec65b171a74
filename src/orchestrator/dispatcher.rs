//! Entry point for decoded inbound messages.

use std::sync::Arc;

use tracing::{debug, info};

use crate::models::message::{InboundMessage, MessageKind};

use super::dedup::DedupCache;
use super::task_manager::TaskManager;

const PREVIEW_CHARS: usize = 50;

/// What the dispatcher did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Text handed to the task manager.
    Accepted,
    /// Redelivery of a message seen within the TTL; dropped silently.
    Duplicate,
    /// Not a text message; logged and dropped.
    Ignored,
}

/// Deduplicates inbound messages and routes text to the task manager.
#[derive(Clone)]
pub struct Dispatcher {
    dedup: Arc<DedupCache>,
    tasks: TaskManager,
}

impl Dispatcher {
    /// Build a dispatcher over `dedup` and `tasks`.
    #[must_use]
    pub fn new(dedup: Arc<DedupCache>, tasks: TaskManager) -> Self {
        Self { dedup, tasks }
    }

    /// Task manager messages are routed to.
    #[must_use]
    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Dispatch `message`.
    ///
    /// Text is routed before returning, so one user's messages take effect
    /// in arrival order. Only the reply is spawned. Must be called from
    /// within a tokio runtime.
    pub fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let key = message.dedup_key();
        if !self.dedup.observe(&key) {
            debug!(key, "duplicate message dropped");
            return DispatchOutcome::Duplicate;
        }

        match message.kind {
            MessageKind::Text => {
                let user_id = message.from_user;
                let content = message.content.unwrap_or_default();
                let preview: String = content.chars().take(PREVIEW_CHARS).collect();
                info!(user_id = %user_id, preview = %preview, "text message received");

                let admission = self.tasks.admit_text(&user_id, &content);
                let tasks = self.tasks.clone();
                tokio::spawn(async move {
                    tasks.send_reply(&user_id, &admission).await;
                });
                DispatchOutcome::Accepted
            }
            other => {
                info!(kind = other.as_str(), user_id = %message.from_user, "ignoring non-text message");
                DispatchOutcome::Ignored
            }
        }
    }
}
