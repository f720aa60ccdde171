//! HTTP surface tests: snapshot endpoint, per-runner view, session control.

use std::sync::Arc;
use std::time::Duration;

use lib_tracker::server::{router, AppState};
use lib_tracker::{Supervisor, TrackerState};
use project_tests::{test_config, wait_for, MockUpstream};

async fn spawn_tracker(upstream: &MockUpstream) -> (String, TrackerState, Arc<Supervisor>) {
    let config = test_config(upstream, Duration::from_secs(60));
    let state = TrackerState::new();
    let supervisor = Arc::new(Supervisor::new(config, state.clone()).unwrap());
    let app = AppState {
        state: state.clone(),
        supervisor: supervisor.clone(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(app)).await.unwrap();
    });

    (format!("http://{}", addr), state, supervisor)
}

#[tokio::test]
async fn data_json_serves_fresh_snapshots_with_cache_suppression() {
    let upstream = MockUpstream::spawn().await;
    upstream.set_poll_response(
        "alice",
        serde_json::json!({ "login": "alice", "currentTime": 12.3, "insertedAt": 100 }),
    );
    let (base, state, _supervisor) = spawn_tracker(&upstream).await;
    let client = reqwest::Client::new();

    // Empty before any session.
    let body: serde_json::Value = client
        .get(format!("{}/data.json", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!([]));

    let response = client
        .post(format!("{}/session/start", base))
        .json(&serde_json::json!({ "runners": ["Alice"] }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let started: serde_json::Value = response.json().await.unwrap();
    assert_eq!(started["tracked"], serde_json::json!(["alice"]));

    wait_for("first poll merge", || state.get("alice").is_some()).await;

    let response = client
        .get(format!("{}/data.json", base))
        .send()
        .await
        .unwrap();
    let cache_control = response
        .headers()
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cache_control.contains("no-store"), "got: {}", cache_control);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!([{
            "login": "alice",
            "currentTime": 12.3,
            "insertedAt": 100,
            "splitIndex": 0,
            "finished": false,
            "currentSplitName": "",
            "delta": 0.0,
            "bestPossible": 0.0,
            "pb": 0.0
        }])
    );

    // Stopping the session cancels everything and empties the snapshot.
    let response = client
        .post(format!("{}/session/stop", base))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: serde_json::Value = client
        .get(format!("{}/data.json", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!([]));
    wait_for("stream listener exit", || upstream.subscriber_count() == 0).await;
}

#[tokio::test]
async fn runner_view_resolves_one_record_by_login() {
    let upstream = MockUpstream::spawn().await;
    upstream.set_poll_response(
        "alice",
        serde_json::json!({ "login": "alice", "currentTime": 7.0 }),
    );
    let (base, state, supervisor) = spawn_tracker(&upstream).await;
    supervisor.begin_session(vec!["alice".to_string()]).await;
    wait_for("first poll merge", || state.get("alice").is_some()).await;

    let client = reqwest::Client::new();

    // Lookup is case-insensitive, mirroring ingestion.
    let response = client
        .get(format!("{}/runner/Alice", base))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["login"], "alice");
    assert_eq!(body["currentTime"], 7.0);

    let response = client
        .get(format!("{}/runner/nobody", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    supervisor.end_session().await;
}

#[tokio::test]
async fn session_start_rejects_blank_runner_lists() {
    let upstream = MockUpstream::spawn().await;
    let (base, _state, _supervisor) = spawn_tracker(&upstream).await;

    let response = reqwest::Client::new()
        .post(format!("{}/session/start", base))
        .json(&serde_json::json!({ "runners": ["", "  "] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_session_state() {
    let upstream = MockUpstream::spawn().await;
    let (base, _state, supervisor) = spawn_tracker(&upstream).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session_active"], false);

    supervisor.begin_session(vec!["alice".to_string()]).await;
    let body: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["session_active"], true);

    supervisor.end_session().await;
}
