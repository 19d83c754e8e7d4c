//! End-to-end test of the WebSocket push channel: spins up the real server
//! on a random port, connects a tungstenite client, and asserts that task
//! mutations arrive as `{type, task}` frames.

use futures_util::StreamExt;
use missiond::config::MissionConfig;
use missiond::push;
use missiond::tasks::model::NewTask;
use missiond::AppContext;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Find a free local port by binding to port 0.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn make_ctx(dir: &TempDir, push_port: u16) -> Arc<AppContext> {
    let config = MissionConfig::new(
        None,
        Some(push_port),
        Some(dir.path().join("data")),
        Some(dir.path().join("workspace")),
        Some("error".to_string()),
        None,
    );
    Arc::new(AppContext::init(config).await.unwrap())
}

#[tokio::test]
async fn connected_subscriber_receives_task_events() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let ctx = make_ctx(&dir, port).await;

    tokio::spawn(push::start_push_server(ctx.clone()));

    // Retry until the listener is up
    let url = format!("ws://127.0.0.1:{port}");
    let mut ws = None;
    for _ in 0..50 {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                ws = Some(socket);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    let mut ws = ws.expect("push server never came up");

    // Give the server side a beat to register its broadcast subscription
    tokio::time::sleep(Duration::from_millis(100)).await;

    ctx.tasks
        .create(NewTask {
            id: "T001".into(),
            title: "Fix bug".into(),
            description: None,
            priority: None,
            assignee: Some("olex".into()),
            category: None,
            due_date: None,
        })
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for push frame")
        .expect("connection closed")
        .expect("ws error");

    let Message::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let event: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(event["type"], "created");
    assert_eq!(event["task"]["id"], "T001");
    assert_eq!(event["task"]["status"], "NEW");
}

#[tokio::test]
async fn mutation_succeeds_with_zero_subscribers() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir, find_free_port()).await;

    // No push server, no subscribers — the mutating call must not block or fail
    let task = ctx
        .tasks
        .create(NewTask {
            id: "T001".into(),
            title: "Fire and forget".into(),
            description: None,
            priority: None,
            assignee: None,
            category: None,
            due_date: None,
        })
        .await
        .unwrap();
    assert_eq!(task.status, "NEW");
}
