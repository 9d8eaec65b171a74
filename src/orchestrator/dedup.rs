//! Short-lived record of inbound messages that were already handled.
//!
//! The messaging platform retries callbacks it considers unacknowledged, so
//! the same message can arrive more than once. Entries are keyed by
//! [`InboundMessage::dedup_key`](crate::models::message::InboundMessage::dedup_key)
//! and expire after the TTL. Expired entries are swept on every observation
//! instead of by a background task.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// TTL-bounded set of seen message keys.
#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl DedupCache {
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record `key` as seen now.
    ///
    /// Returns `true` when the key is new (or its previous sighting expired)
    /// and the message should be processed; `false` for a duplicate.
    pub fn observe(&self, key: &str) -> bool {
        self.observe_at(key, Instant::now())
    }

    /// [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(seen_at) = entries.get(key) {
            if now.saturating_duration_since(*seen_at) < self.ttl {
                return false;
            }
        }

        entries.insert(key.to_owned(), now);
        entries.retain(|_, seen_at| now.saturating_duration_since(*seen_at) <= self.ttl);
        true
    }

    /// Number of remembered keys, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
