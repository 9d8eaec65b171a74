use clip_digest::models::task::{is_trigger_word, PendingTask, TaskState};

fn task(share_text: &str) -> PendingTask {
    PendingTask::new("u1".into(), "https://v.example/a".into(), share_text.into())
}

#[test]
fn trigger_words_match_case_insensitively() {
    assert!(is_trigger_word("开始"));
    assert!(is_trigger_word(" OK "));
    assert!(is_trigger_word("Start"));
    assert!(is_trigger_word("好"));
    assert!(!is_trigger_word("开始吧"));
    assert!(!is_trigger_word("关注投资策略"));
}

#[test]
fn new_task_is_pending_with_unique_id() {
    let a = task("");
    let b = task("");
    assert_eq!(a.state(), TaskState::Pending);
    assert_ne!(a.task_id, b.task_id);
    assert!(a.timer.is_none());
}

#[test]
fn follow_up_overrides_inline_requirement() {
    let mut t = task("inline");
    t.extra_requirement = Some("关注风险".into());
    assert_eq!(t.effective_requirement().as_deref(), Some("关注风险"));
}

#[test]
fn trigger_follow_up_keeps_inline_requirement() {
    let mut t = task("inline");
    t.extra_requirement = Some("开始".into());
    assert_eq!(t.effective_requirement().as_deref(), Some("inline"));
}

#[test]
fn no_requirement_at_all_is_none() {
    let mut t = task("   ");
    assert_eq!(t.effective_requirement(), None);
    t.extra_requirement = Some("ok".into());
    assert_eq!(t.effective_requirement(), None);
}

#[test]
fn claim_snapshots_task_fields() {
    let mut t = task("inline");
    t.processing = true;
    let claimed = t.claim();
    assert_eq!(t.state(), TaskState::Processing);
    assert_eq!(claimed.task_id, t.task_id);
    assert_eq!(claimed.user_id, "u1");
    assert_eq!(claimed.share_url, "https://v.example/a");
    assert_eq!(claimed.requirement.as_deref(), Some("inline"));
}
