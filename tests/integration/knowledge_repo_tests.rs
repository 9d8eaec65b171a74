//! Knowledge-base persistence on in-memory and file-backed `SQLite`.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use clip_digest::models::knowledge::KnowledgeEntry;
use clip_digest::persistence::db;
use clip_digest::persistence::knowledge_repo::KnowledgeRepo;
use clip_digest::persistence::KnowledgeStore;

fn entry(code: &str, minutes: i64) -> KnowledgeEntry {
    KnowledgeEntry {
        video_id: format!("vid-{code}"),
        title: "复利的力量".into(),
        author: "老王".into(),
        source_url: "https://v.example/a".into(),
        summary_markdown: "# 笔记\n## 复利".into(),
        tags: vec!["复利".into(), "长期主义".into()],
        user_requirement: "关注风险".into(),
        video_code: code.into(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes),
    }
}

async fn repo() -> KnowledgeRepo {
    let pool = db::connect_memory().await.expect("memory db");
    KnowledgeRepo::new(Arc::new(pool))
}

#[tokio::test]
async fn saved_entry_round_trips_by_code() {
    let repo = repo().await;
    let original = entry("ab12c", 0);
    repo.save(&original).await.expect("save");

    let loaded = repo.find_by_code("ab12c").await.expect("query").expect("present");
    assert_eq!(loaded, original);
    assert_eq!(repo.count().await.expect("count"), 1);
}

#[tokio::test]
async fn unknown_code_is_none() {
    let repo = repo().await;
    assert!(repo.find_by_code("zzzzz").await.expect("query").is_none());
}

#[tokio::test]
async fn saving_same_code_replaces_entry() {
    let repo = repo().await;
    repo.save(&entry("ab12c", 0)).await.expect("save");
    let mut updated = entry("ab12c", 5);
    updated.summary_markdown = "# 新版".into();
    repo.save(&updated).await.expect("save again");

    assert_eq!(repo.count().await.expect("count"), 1);
    let loaded = repo.find_by_code("ab12c").await.expect("query").expect("present");
    assert_eq!(loaded.summary_markdown, "# 新版");
}

#[tokio::test]
async fn recent_entries_are_newest_first_and_limited() {
    let repo = repo().await;
    for (code, minutes) in [("aaaaa", 0), ("bbbbb", 10), ("ccccc", 5)] {
        repo.save(&entry(code, minutes)).await.expect("save");
    }

    let recent = repo.list_recent(2).await.expect("list");
    let codes: Vec<_> = recent.iter().map(|e| e.video_code.as_str()).collect();
    assert_eq!(codes, vec!["bbbbb", "ccccc"]);
}

#[tokio::test]
async fn store_trait_persists_through_repo() {
    let repo = repo().await;
    let store: &dyn KnowledgeStore = &repo;
    store.save(&entry("trait", 0)).await.expect("save");
    assert!(repo.find_by_code("trait").await.expect("query").is_some());
}

#[tokio::test]
async fn file_database_is_created_with_parent_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("kb.db");
    let pool = db::connect(&path).await.expect("file db");
    let repo = KnowledgeRepo::new(Arc::new(pool));
    repo.save(&entry("file1", 0)).await.expect("save");

    assert!(path.exists());
    assert_eq!(repo.count().await.expect("count"), 1);
}
