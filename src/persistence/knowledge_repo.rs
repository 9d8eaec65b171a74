//! Knowledge-base repository for `SQLite` persistence.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;

use crate::models::knowledge::KnowledgeEntry;
use crate::{AppError, Result};

use super::db::Database;
use super::KnowledgeStore;

/// Repository for finished summaries.
#[derive(Clone)]
pub struct KnowledgeRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct KnowledgeRow {
    video_code: String,
    video_id: String,
    title: String,
    author: String,
    source_url: String,
    summary_markdown: String,
    tags: String,
    user_requirement: String,
    created_at: String,
}

impl KnowledgeRow {
    fn into_entry(self) -> Result<KnowledgeEntry> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .map_err(|e| AppError::Db(format!("invalid tags: {e}")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Db(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(KnowledgeEntry {
            video_id: self.video_id,
            title: self.title,
            author: self.author,
            source_url: self.source_url,
            summary_markdown: self.summary_markdown,
            tags,
            user_requirement: self.user_requirement,
            video_code: self.video_code,
            created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT video_code, video_id, title, author, source_url, \
     summary_markdown, tags, user_requirement, created_at FROM knowledge_entry";

impl KnowledgeRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert `entry`, replacing any entry with the same video code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn save(&self, entry: &KnowledgeEntry) -> Result<()> {
        let tags = serde_json::to_string(&entry.tags)
            .map_err(|e| AppError::Db(format!("failed to encode tags: {e}")))?;

        sqlx::query(
            "INSERT INTO knowledge_entry
                (video_code, video_id, title, author, source_url, summary_markdown, tags, user_requirement, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(video_code) DO UPDATE SET
                video_id = excluded.video_id,
                title = excluded.title,
                author = excluded.author,
                source_url = excluded.source_url,
                summary_markdown = excluded.summary_markdown,
                tags = excluded.tags,
                user_requirement = excluded.user_requirement,
                created_at = excluded.created_at",
        )
        .bind(&entry.video_code)
        .bind(&entry.video_id)
        .bind(&entry.title)
        .bind(&entry.author)
        .bind(&entry.source_url)
        .bind(&entry.summary_markdown)
        .bind(&tags)
        .bind(&entry.user_requirement)
        .bind(entry.created_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Look up an entry by the code shown to the user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the row is corrupt.
    pub async fn find_by_code(&self, video_code: &str) -> Result<Option<KnowledgeEntry>> {
        let row: Option<KnowledgeRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE video_code = ?1"))
                .bind(video_code)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(KnowledgeRow::into_entry).transpose()
    }

    /// Most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a row is corrupt.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<KnowledgeEntry>> {
        let rows: Vec<KnowledgeRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(KnowledgeRow::into_entry).collect()
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM knowledge_entry")
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(count)
    }
}

impl KnowledgeStore for KnowledgeRepo {
    fn save<'a>(
        &'a self,
        entry: &'a KnowledgeEntry,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(KnowledgeRepo::save(self, entry))
    }
}
