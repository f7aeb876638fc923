//! End-to-end tests of the router: websocket sessions and metadata endpoints

mod helpers;

use buildrelay::core::{Branch, RunEvent};
use buildrelay::execution::PipelineOrchestrator;
use buildrelay::server::{router, AppState};
use futures::{SinkExt, StreamExt};
use helpers::{describe, scratch_dir, test_config, wait_for, MockRepo, ScriptBehavior};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BUILD: &str = "scripts/build.sh";

/// Serve the router on an ephemeral port and return its address
async fn spawn_server(repo: MockRepo) -> String {
    let dir = scratch_dir();
    let orchestrator = PipelineOrchestrator::new(repo, Arc::new(test_config(dir.path())));
    let app = router(Arc::new(AppState::new(orchestrator)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // The workspace lives as long as the server task
    tokio::spawn(async move {
        let _dir = dir;
        axum::serve(listener, app).await.unwrap();
    });
    format!("{}", addr)
}

async fn connect(addr: &str) -> Socket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("websocket connect");
    socket
}

/// Read the next event, failing after a few seconds
async fn next_event(socket: &mut Socket) -> RunEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .expect("connection closed")
            .expect("websocket error");

        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("event envelope");
        }
    }
}

/// Read events until (and including) one with the given message
async fn events_until(socket: &mut Socket, last: &str) -> Vec<String> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(socket).await;
        let done = event.message() == Some(last);
        seen.push(describe(&event));
        if done {
            return seen;
        }
    }
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

fn run_request(branch: &str, fetch: bool, build: bool) -> Value {
    json!({
        "gitConfig": "main",
        "branch": branch,
        "pullRepos": fetch,
        "buildImages": build,
        "pushHarbor": false,
        "deploy": false
    })
}

#[tokio::test]
async fn test_greeting_then_run_events_in_order() {
    let repo = MockRepo::new().with_script(
        BUILD,
        ScriptBehavior::Succeed(vec!["building image".to_string()]),
    );
    let addr = spawn_server(repo).await;
    let mut socket = connect(&addr).await;

    assert_eq!(
        describe(&next_event(&mut socket).await),
        "info: WebSocket connection established"
    );

    send(&mut socket, run_request("release/0804", true, true)).await;
    let events = events_until(&mut socket, "Build completed successfully").await;
    assert_eq!(
        events,
        vec![
            "info: Fetching branch release/0804...",
            "success: Branch release/0804 fetched",
            "progress: 50",
            "info: Running build script...",
            "info: building image",
            "success: Build script finished",
            "progress: 100",
            "success: Build completed successfully",
        ]
    );
}

#[tokio::test]
async fn test_invalid_message_keeps_session_open() {
    let addr = spawn_server(MockRepo::new()).await;
    let mut socket = connect(&addr).await;
    next_event(&mut socket).await;

    socket.send(Message::Text("{not json".to_string())).await.unwrap();
    let event = next_event(&mut socket).await;
    assert!(event.message().unwrap().starts_with("Invalid request"));

    // Still usable afterwards
    send(&mut socket, run_request("dev", false, false)).await;
    assert_eq!(
        events_until(&mut socket, "Build completed successfully").await,
        vec!["success: Build completed successfully"]
    );
}

#[tokio::test]
async fn test_unknown_identity_is_reported_on_the_socket() {
    let addr = spawn_server(MockRepo::new()).await;
    let mut socket = connect(&addr).await;
    next_event(&mut socket).await;

    send(
        &mut socket,
        json!({ "gitConfig": "nope", "branch": "dev", "pullRepos": true }),
    )
    .await;
    assert_eq!(
        describe(&next_event(&mut socket).await),
        "error: Unknown repository configuration: nope"
    );
}

#[tokio::test]
async fn test_stop_cancels_running_build() {
    let repo = MockRepo::new().with_script(BUILD, ScriptBehavior::Hang);
    let addr = spawn_server(repo).await;
    let mut socket = connect(&addr).await;
    next_event(&mut socket).await;

    send(&mut socket, run_request("dev", false, true)).await;
    assert_eq!(
        describe(&next_event(&mut socket).await),
        "info: Running build script..."
    );

    send(&mut socket, json!({ "type": "stop" })).await;
    assert_eq!(describe(&next_event(&mut socket).await), "error: Run cancelled");

    // Later runs of the same session are not affected by the earlier stop
    send(&mut socket, run_request("dev", false, false)).await;
    assert_eq!(
        describe(&next_event(&mut socket).await),
        "success: Build completed successfully"
    );
}

#[tokio::test]
async fn test_disconnect_cancels_running_build() {
    let repo = MockRepo::new().with_script(BUILD, ScriptBehavior::Hang);
    let calls = repo.calls.clone();
    let addr = spawn_server(repo).await;
    let mut socket = connect(&addr).await;
    next_event(&mut socket).await;

    send(&mut socket, run_request("dev", false, true)).await;
    next_event(&mut socket).await;

    let _ = socket.close(None).await;
    drop(socket);

    let cancelled = format!("cancelled {}", BUILD);
    wait_for(|| calls.lock().unwrap().contains(&cancelled)).await;
}

#[tokio::test]
async fn test_git_configs_hide_tokens() {
    let addr = spawn_server(MockRepo::new()).await;
    let body: Value = reqwest::get(format!("http://{}/api/git-configs", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let configs = body.as_array().unwrap();
    assert!(configs.iter().any(|c| c["name"] == "main"));
    assert!(configs.iter().all(|c| c.get("token").is_none()));
}

#[tokio::test]
async fn test_branch_listing() {
    let repo = MockRepo::new().with_branches(vec![
        Branch::new("main", "0123456789abcdef"),
        Branch::new("release/0804", "fedcba9876543210"),
    ]);
    let addr = spawn_server(repo).await;

    let body: Value = reqwest::get(format!("http://{}/api/branches/main", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body[0]["name"], "main");
    assert_eq!(body[0]["commit_hash"], "01234567");
    assert_eq!(body[0]["is_release"], false);
    assert_eq!(body[1]["is_release"], true);
}

#[tokio::test]
async fn test_unknown_identity_is_404() {
    let addr = spawn_server(MockRepo::new()).await;
    let response = reqwest::get(format!("http://{}/api/branches/nope", addr))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_branch_metadata_files() {
    let repo = MockRepo::new()
        .with_file("config.yaml", "services:\n  - name: api\n    replicas: 2\n")
        .with_file("release-notes.md", "# 0804\n- faster builds\n");
    let addr = spawn_server(repo).await;

    let config: Value = reqwest::get(format!("http://{}/api/config/main/release/0804", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config["services"][0]["name"], "api");
    assert_eq!(config["services"][0]["replicas"], 2);

    let notes: Value = reqwest::get(format!("http://{}/api/release-notes/main/release/0804", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notes["branch"], "release/0804");
    assert!(notes["notes"].as_str().unwrap().contains("faster builds"));

    // No versions.json in the tree
    let response = reqwest::get(format!("http://{}/api/versions/main/release/0804", addr))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
