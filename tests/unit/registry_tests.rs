//! Lifecycle transitions of the per-user task registry.

use std::time::Duration;

use tokio::sync::mpsc;

use clip_digest::models::task::TaskState;
use clip_digest::orchestrator::debounce::{DebounceEvent, DebounceHandle, DebounceTimer};
use clip_digest::orchestrator::registry::{Admission, SharedLink, TaskRegistry};

const LONG: Duration = Duration::from_secs(3600);

fn link(url: &str, requirement: &str) -> Option<SharedLink> {
    Some(SharedLink {
        url: url.to_owned(),
        inline_requirement: requirement.to_owned(),
    })
}

fn arm(tx: &mpsc::Sender<DebounceEvent>) -> impl FnOnce(&str) -> DebounceHandle + '_ {
    move |task_id| DebounceTimer::new("u1".into(), task_id.to_owned(), LONG, tx.clone()).spawn()
}

fn started_id(admission: &Admission) -> String {
    match admission {
        Admission::Started { task_id, .. } => task_id.clone(),
        other => panic!("expected Started, got {other:?}"),
    }
}

#[tokio::test]
async fn text_without_task_or_link_gets_help() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    let admission = registry.admit("u1", "hello", None, arm(&tx));
    assert_eq!(admission, Admission::Help);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn link_creates_pending_task() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    let admission = registry.admit("u1", "看看 https://v.example/a", link("https://v.example/a", "看看"), arm(&tx));
    assert!(matches!(admission, Admission::Started { replaced: None, .. }));
    assert_eq!(registry.state("u1"), Some(TaskState::Pending));
    assert_eq!(registry.share_url("u1").as_deref(), Some("https://v.example/a"));
}

#[tokio::test]
async fn second_link_replaces_pending_task() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    let first = started_id(&registry.admit("u1", "a", link("https://v.example/a", ""), arm(&tx)));
    let second = registry.admit("u1", "b", link("https://v.example/b", ""), arm(&tx));

    match second {
        Admission::Started { task_id, replaced } => {
            assert_ne!(task_id, first);
            assert_eq!(replaced.as_deref(), Some(first.as_str()));
        }
        other => panic!("expected Started, got {other:?}"),
    }
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.share_url("u1").as_deref(), Some("https://v.example/b"));
}

#[tokio::test]
async fn follow_up_claims_with_requirement() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    registry.admit("u1", "x", link("https://v.example/a", "inline"), arm(&tx));

    let admission = registry.admit("u1", " 关注投资策略 ", None, arm(&tx));
    match admission {
        Admission::Claimed(task) => {
            assert_eq!(task.share_url, "https://v.example/a");
            assert_eq!(task.requirement.as_deref(), Some("关注投资策略"));
        }
        other => panic!("expected Claimed, got {other:?}"),
    }
    assert_eq!(registry.state("u1"), Some(TaskState::Processing));
}

#[tokio::test]
async fn trigger_word_keeps_inline_requirement() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    registry.admit("u1", "x", link("https://v.example/a", "inline"), arm(&tx));

    let Admission::Claimed(task) = registry.admit("u1", "开始", None, arm(&tx)) else {
        panic!("expected Claimed");
    };
    assert_eq!(task.requirement.as_deref(), Some("inline"));
}

#[tokio::test]
async fn processing_task_answers_busy_even_for_new_link() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    registry.admit("u1", "x", link("https://v.example/a", ""), arm(&tx));
    registry.admit("u1", "开始", None, arm(&tx));

    assert_eq!(registry.admit("u1", "more", None, arm(&tx)), Admission::Busy);
    assert_eq!(
        registry.admit("u1", "y", link("https://v.example/b", ""), arm(&tx)),
        Admission::Busy
    );
    assert_eq!(registry.share_url("u1").as_deref(), Some("https://v.example/a"));
}

#[tokio::test]
async fn claim_by_timer_requires_current_task_id() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    let first = started_id(&registry.admit("u1", "a", link("https://v.example/a", ""), arm(&tx)));
    let second = started_id(&registry.admit("u1", "b", link("https://v.example/b", ""), arm(&tx)));

    assert!(registry.claim("u1", &first).is_none(), "stale timer must not start");
    let claimed = registry.claim("u1", &second).expect("current task claims");
    assert_eq!(claimed.task_id, second);
    assert!(registry.claim("u1", &second).is_none(), "claim happens once");
}

#[tokio::test]
async fn release_removes_only_matching_task() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    let id = started_id(&registry.admit("u1", "a", link("https://v.example/a", ""), arm(&tx)));

    assert!(!registry.release("u1", "other-id"));
    assert_eq!(registry.len(), 1);
    assert!(registry.release("u1", &id));
    assert!(registry.is_empty());
    assert!(!registry.release("u1", &id));
}

#[tokio::test]
async fn users_are_independent() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = TaskRegistry::new();
    registry.admit("u1", "a", link("https://v.example/a", ""), arm(&tx));
    assert_eq!(registry.admit("u2", "hi", None, arm(&tx)), Admission::Help);
    assert_eq!(registry.state("u2"), None);
}
