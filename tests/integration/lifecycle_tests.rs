//! Per-user task lifecycle: debounce, follow-ups, busy replies, teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use clip_digest::delivery::replies;
use clip_digest::models::task::TaskState;
use clip_digest::orchestrator::debounce::DebounceEvent;
use clip_digest::orchestrator::registry::{Admission, TaskRegistry};
use clip_digest::orchestrator::task_manager::{spawn_debounce_consumer, TaskManager};

use super::test_helpers::{wait_until, FakeExecutor, RecordingMessenger};

const WINDOW: Duration = Duration::from_millis(150);
const LINK: &str = "看看这个 https://v.example/a 关注风险";

struct Harness {
    manager: TaskManager,
    messenger: Arc<RecordingMessenger>,
    executor: Arc<FakeExecutor>,
    cancel: CancellationToken,
}

impl Harness {
    fn start(executor: FakeExecutor, window: Duration) -> Self {
        let messenger = Arc::new(RecordingMessenger::default());
        let executor = Arc::new(executor);
        let (tx, rx) = mpsc::channel(16);
        let manager = TaskManager::new(
            Arc::new(TaskRegistry::new()),
            messenger.clone(),
            executor.clone(),
            window,
            tx,
        );
        let cancel = CancellationToken::new();
        let _consumer = spawn_debounce_consumer(manager.clone(), rx, cancel.clone());
        Self {
            manager,
            messenger,
            executor,
            cancel,
        }
    }

    fn registry(&self) -> &Arc<TaskRegistry> {
        self.manager.registry()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn link_is_acknowledged_and_runs_after_window() {
    let h = Harness::start(FakeExecutor::default(), WINDOW);

    h.manager.handle_text("u1", LINK).await;
    assert_eq!(h.messenger.texts_to("u1"), vec![replies::ACK]);
    assert_eq!(h.registry().state("u1"), Some(TaskState::Pending));
    assert!(h.executor.runs().is_empty());

    wait_until(|| h.registry().is_empty()).await;
    let runs = h.executor.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].share_url, "https://v.example/a");
    assert_eq!(runs[0].requirement.as_deref(), Some("看看这个 关注风险"));
    assert_eq!(h.executor.cleaned(), vec![format!("vid-{}", runs[0].task_id)]);
}

#[tokio::test]
async fn trigger_word_starts_immediately_and_timer_stays_silent() {
    let h = Harness::start(FakeExecutor::default(), WINDOW);

    h.manager.handle_text("u1", "https://v.example/a").await;
    let admission = h.manager.route_text("u1", "开始").await.expect("routes");
    assert!(matches!(admission, Admission::Claimed(_)));

    wait_until(|| h.registry().is_empty()).await;
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(h.executor.runs().len(), 1, "cancelled timer must not start a second run");
    assert_eq!(h.executor.runs()[0].requirement, None);
}

#[tokio::test]
async fn timer_for_claimed_task_does_not_start_second_run() {
    let gate = Arc::new(Notify::new());
    let h = Harness::start(FakeExecutor::gated(gate.clone()), Duration::from_secs(60));

    h.manager.handle_text("u1", "https://v.example/a").await;
    let Admission::Claimed(task) = h.manager.route_text("u1", "开始").await.expect("routes") else {
        panic!("trigger word should claim the pending task");
    };

    let late_timer = h.manager.on_debounce_event(DebounceEvent::Elapsed {
        user_id: "u1".into(),
        task_id: task.task_id.clone(),
    });
    assert!(late_timer.is_none());
    assert_eq!(h.registry().state("u1"), Some(TaskState::Processing));

    gate.notify_one();
    wait_until(|| h.registry().is_empty()).await;
    assert_eq!(h.executor.runs().len(), 1);
    assert_eq!(h.executor.runs()[0].task_id, task.task_id);
}

#[tokio::test]
async fn follow_up_text_becomes_requirement() {
    let h = Harness::start(FakeExecutor::default(), Duration::from_secs(60));

    h.manager.handle_text("u1", LINK).await;
    h.manager.handle_text("u1", "只看第二部分").await;

    wait_until(|| h.registry().is_empty()).await;
    let runs = h.executor.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].requirement.as_deref(), Some("只看第二部分"));
}

#[tokio::test]
async fn new_link_replaces_pending_task() {
    let h = Harness::start(FakeExecutor::default(), WINDOW);

    h.manager.handle_text("u1", "https://v.example/a").await;
    h.manager.handle_text("u1", "https://v.example/b").await;
    assert_eq!(h.messenger.texts_to("u1"), vec![replies::ACK, replies::ACK]);

    wait_until(|| h.registry().is_empty()).await;
    tokio::time::sleep(WINDOW * 2).await;
    let runs = h.executor.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].share_url, "https://v.example/b");
}

#[tokio::test]
async fn messages_while_processing_get_busy_reply() {
    let gate = Arc::new(Notify::new());
    let h = Harness::start(FakeExecutor::gated(gate.clone()), Duration::from_secs(60));

    h.manager.handle_text("u1", "https://v.example/a").await;
    h.manager.handle_text("u1", "开始").await;
    wait_until(|| h.executor.runs().len() == 1).await;

    h.manager.handle_text("u1", "还有一个要求").await;
    h.manager.handle_text("u1", "https://v.example/b").await;
    assert_eq!(
        h.messenger.texts_to("u1"),
        vec![replies::ACK, replies::BUSY, replies::BUSY]
    );
    assert_eq!(h.registry().share_url("u1").as_deref(), Some("https://v.example/a"));

    gate.notify_one();
    wait_until(|| h.registry().is_empty()).await;
    assert_eq!(h.executor.runs().len(), 1);
}

#[tokio::test]
async fn failed_run_is_reported_and_torn_down() {
    let h = Harness::start(FakeExecutor::failing(), Duration::from_secs(60));

    h.manager.handle_text("u1", "https://v.example/a").await;
    h.manager.handle_text("u1", "开始").await;

    wait_until(|| h.registry().is_empty()).await;
    wait_until(|| h.messenger.texts_to("u1").len() == 2).await;
    let texts = h.messenger.texts_to("u1");
    assert!(texts[1].starts_with("处理失败: "), "got {texts:?}");
    assert!(texts[1].contains("link expired"));
    assert_eq!(h.executor.cleaned().len(), 1);
}

#[tokio::test]
async fn text_without_link_gets_help() {
    let h = Harness::start(FakeExecutor::default(), WINDOW);

    h.manager.handle_text("u1", "你好").await;
    assert_eq!(h.messenger.texts_to("u1"), vec![replies::HELP]);
    assert!(h.registry().is_empty());
}

#[tokio::test]
async fn users_do_not_block_each_other() {
    let gate = Arc::new(Notify::new());
    let h = Harness::start(FakeExecutor::gated(gate.clone()), Duration::from_secs(60));

    h.manager.handle_text("u1", "https://v.example/a").await;
    h.manager.handle_text("u1", "开始").await;
    h.manager.handle_text("u2", "https://v.example/b").await;

    assert_eq!(h.messenger.texts_to("u2"), vec![replies::ACK]);
    assert_eq!(h.registry().state("u2"), Some(TaskState::Pending));
    assert_eq!(h.manager.pending_count(), 2);
    gate.notify_waiters();
}

#[tokio::test]
async fn stale_timer_event_is_ignored() {
    let h = Harness::start(FakeExecutor::default(), Duration::from_secs(60));

    h.manager.handle_text("u1", "https://v.example/a").await;
    let handle = h
        .manager
        .on_debounce_event(clip_digest::orchestrator::debounce::DebounceEvent::Elapsed {
            user_id: "u1".into(),
            task_id: "not-the-current-task".into(),
        });
    assert!(handle.is_none());
    assert_eq!(h.registry().state("u1"), Some(TaskState::Pending));
}
