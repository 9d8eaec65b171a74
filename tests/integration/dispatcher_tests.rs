//! Deduplication and routing of decoded inbound messages.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use clip_digest::delivery::replies;
use clip_digest::models::message::{InboundMessage, MessageKind};
use clip_digest::orchestrator::dedup::DedupCache;
use clip_digest::orchestrator::dispatcher::{DispatchOutcome, Dispatcher};
use clip_digest::orchestrator::registry::TaskRegistry;
use clip_digest::orchestrator::task_manager::TaskManager;

use super::test_helpers::{wait_until, FakeExecutor, RecordingMessenger};

fn dispatcher() -> (Dispatcher, Arc<RecordingMessenger>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let (tx, _rx) = mpsc::channel(8);
    let tasks = TaskManager::new(
        Arc::new(TaskRegistry::new()),
        messenger.clone(),
        Arc::new(FakeExecutor::default()),
        Duration::from_secs(60),
        tx,
    );
    let dedup = Arc::new(DedupCache::new(Duration::from_secs(300)));
    (Dispatcher::new(dedup, tasks), messenger)
}

#[tokio::test]
async fn text_is_accepted_and_answered() {
    let (dispatcher, messenger) = dispatcher();
    let outcome = dispatcher.dispatch(InboundMessage::text("u1", "m1", "1700000000", "你好"));
    assert_eq!(outcome, DispatchOutcome::Accepted);
    wait_until(|| messenger.texts_to("u1") == vec![replies::HELP]).await;
}

#[tokio::test]
async fn redelivered_message_is_dropped() {
    let (dispatcher, messenger) = dispatcher();
    let message = InboundMessage::text("u1", "m1", "1700000000", "https://v.example/a");

    assert_eq!(dispatcher.dispatch(message.clone()), DispatchOutcome::Accepted);
    assert_eq!(dispatcher.dispatch(message), DispatchOutcome::Duplicate);

    wait_until(|| !messenger.texts_to("u1").is_empty()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(messenger.texts_to("u1"), vec![replies::ACK]);
    assert_eq!(dispatcher.tasks().pending_count(), 1);
}

#[tokio::test]
async fn same_id_with_new_timestamp_is_not_a_duplicate() {
    let (dispatcher, _messenger) = dispatcher();
    assert_eq!(
        dispatcher.dispatch(InboundMessage::text("u1", "m1", "1", "a")),
        DispatchOutcome::Accepted
    );
    assert_eq!(
        dispatcher.dispatch(InboundMessage::text("u1", "m1", "2", "b")),
        DispatchOutcome::Accepted
    );
}

#[tokio::test]
async fn non_text_messages_are_ignored() {
    let (dispatcher, messenger) = dispatcher();
    let image = InboundMessage {
        kind: MessageKind::Image,
        from_user: "u1".into(),
        msg_id: "m9".into(),
        create_time: "1".into(),
        content: None,
    };
    assert_eq!(dispatcher.dispatch(image), DispatchOutcome::Ignored);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(messenger.sent().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn follow_up_right_after_link_starts_the_task() {
    let messenger = Arc::new(RecordingMessenger::default());
    let executor = Arc::new(FakeExecutor::default());
    let (tx, _rx) = mpsc::channel(8);
    let tasks = TaskManager::new(
        Arc::new(TaskRegistry::new()),
        messenger.clone(),
        executor.clone(),
        Duration::from_secs(60),
        tx,
    );
    let dispatcher = Dispatcher::new(Arc::new(DedupCache::new(Duration::from_secs(300))), tasks);

    let users: Vec<String> = (0..500).map(|i| format!("u{i}")).collect();
    for (i, user) in users.iter().enumerate() {
        dispatcher.dispatch(InboundMessage::text(user, &format!("a{i}"), "1", "https://v.example/a"));
        dispatcher.dispatch(InboundMessage::text(user, &format!("b{i}"), "2", "关注投资策略"));
    }

    wait_until(|| executor.runs().len() == users.len()).await;
    for run in executor.runs() {
        assert_eq!(run.requirement.as_deref(), Some("关注投资策略"));
    }
    for user in &users {
        assert!(!messenger.texts_to(user).iter().any(|text| text == replies::HELP));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn latest_of_back_to_back_links_is_kept() {
    let (dispatcher, _messenger) = dispatcher();
    for i in 0..200 {
        let user = format!("u{i}");
        dispatcher.dispatch(InboundMessage::text(&user, "m1", "1", "https://v.example/old"));
        dispatcher.dispatch(InboundMessage::text(&user, "m2", "2", "https://v.example/new"));
        assert_eq!(
            dispatcher.tasks().registry().share_url(&user).as_deref(),
            Some("https://v.example/new")
        );
    }
}
