//! `SQLite` schema bootstrap logic.
//!
//! Every statement uses `IF NOT EXISTS`, so bootstrapping on each startup
//! is safe.

use sqlx::SqlitePool;

use crate::Result;

/// Create the knowledge-base table and its indexes.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS knowledge_entry (
    video_code       TEXT PRIMARY KEY NOT NULL,
    video_id         TEXT NOT NULL,
    title            TEXT NOT NULL,
    author           TEXT NOT NULL,
    source_url       TEXT NOT NULL,
    summary_markdown TEXT NOT NULL,
    tags             TEXT NOT NULL DEFAULT '[]',
    user_requirement TEXT NOT NULL DEFAULT '',
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_video ON knowledge_entry(video_id);
CREATE INDEX IF NOT EXISTS idx_knowledge_created ON knowledge_entry(created_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
