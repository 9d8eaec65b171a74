//! HTTP surface over an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use clip_digest::delivery::replies;
use clip_digest::orchestrator::dedup::DedupCache;
use clip_digest::orchestrator::dispatcher::Dispatcher;
use clip_digest::orchestrator::registry::TaskRegistry;
use clip_digest::orchestrator::task_manager::TaskManager;
use clip_digest::webhook::codec::PlaintextCodec;
use clip_digest::webhook::server::{serve_listener, AppState, CALLBACK_ACK};

use super::test_helpers::{wait_until, FakeExecutor, RecordingMessenger};

struct Server {
    base: String,
    messenger: Arc<RecordingMessenger>,
    ct: CancellationToken,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

async fn spawn_server() -> Server {
    let messenger = Arc::new(RecordingMessenger::default());
    let (tx, _rx) = mpsc::channel(8);
    let tasks = TaskManager::new(
        Arc::new(TaskRegistry::new()),
        messenger.clone(),
        Arc::new(FakeExecutor::default()),
        Duration::from_secs(60),
        tx,
    );
    let state = AppState {
        dispatcher: Dispatcher::new(Arc::new(DedupCache::new(Duration::from_secs(300))), tasks),
        codec: Arc::new(PlaintextCodec),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = serve_listener(state, listener, server_ct).await;
    });

    Server {
        base: format!("http://{addr}"),
        messenger,
        ct,
    }
}

fn text_callback(msg_id: &str, content: &str) -> String {
    format!(
        "<xml><ToUserName><![CDATA[ww1]]></ToUserName>\
         <FromUserName><![CDATA[u1]]></FromUserName>\
         <CreateTime>1700000000</CreateTime>\
         <MsgType><![CDATA[text]]></MsgType>\
         <Content><![CDATA[{content}]]></Content>\
         <MsgId>{msg_id}</MsgId></xml>"
    )
}

#[tokio::test]
async fn health_reports_pending_tasks() {
    let server = spawn_server().await;
    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pending"], 0);
}

#[tokio::test]
async fn root_identifies_service() {
    let server = spawn_server().await;
    let body: Value = reqwest::get(format!("{}/", server.base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["message"], "clip-digest running");
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let server = spawn_server().await;
    let response = reqwest::get(format!(
        "{}/callback?msg_signature=s&timestamp=1&nonce=n&echostr=hello123",
        server.base
    ))
    .await
    .expect("request");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body"), "hello123");
}

#[tokio::test]
async fn url_verification_without_challenge_is_bad_request() {
    let server = spawn_server().await;
    let response = reqwest::get(format!("{}/callback", server.base))
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn callback_is_acknowledged_and_dispatched() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/callback?msg_signature=s&timestamp=1&nonce=n", server.base))
        .body(text_callback("m1", "https://v.example/a"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body"), CALLBACK_ACK);

    wait_until(|| server.messenger.texts_to("u1") == vec![replies::ACK]).await;

    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["pending"], 1);
}

#[tokio::test]
async fn malformed_callback_is_still_acknowledged() {
    let server = spawn_server().await;
    let response = reqwest::Client::new()
        .post(format!("{}/callback", server.base))
        .body("not xml")
        .send()
        .await
        .expect("request");
    assert_eq!(response.text().await.expect("body"), CALLBACK_ACK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.messenger.sent().is_empty());
}
