//! Persistence layer modules.

pub mod db;
pub mod knowledge_repo;
pub mod schema;

use std::future::Future;
use std::pin::Pin;

use crate::models::knowledge::KnowledgeEntry;
use crate::Result;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Destination for finished summaries.
pub trait KnowledgeStore: Send + Sync {
    /// Persist `entry`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` when the write fails.
    fn save<'a>(
        &'a self,
        entry: &'a KnowledgeEntry,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
