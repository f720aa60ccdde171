//! Shared fixtures for the integration tests.
//!
//! `MockUpstream` is an in-process stand-in for the remote service: a
//! per-runner status resource (`GET /live/{login}`) plus a push stream
//! (`GET /ws`, upgraded to a WebSocket that relays everything sent through
//! the broadcast handle to every subscriber).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::broadcast;

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<HashMap<String, serde_json::Value>>>,
    poll_hits: Arc<Mutex<HashMap<String, usize>>>,
    push_tx: broadcast::Sender<String>,
}

pub struct MockUpstream {
    pub http_api_base: String,
    pub ws_api_base: String,
    responses: Arc<Mutex<HashMap<String, serde_json::Value>>>,
    poll_hits: Arc<Mutex<HashMap<String, usize>>>,
    push_tx: broadcast::Sender<String>,
}

impl MockUpstream {
    pub async fn spawn() -> MockUpstream {
        let (push_tx, _) = broadcast::channel(64);
        let responses = Arc::new(Mutex::new(HashMap::new()));
        let poll_hits = Arc::new(Mutex::new(HashMap::new()));

        let state = MockState {
            responses: responses.clone(),
            poll_hits: poll_hits.clone(),
            push_tx: push_tx.clone(),
        };
        let app = Router::new()
            .route("/live/{login}", get(live_handler))
            .route("/ws", get(ws_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock upstream serve");
        });

        MockUpstream {
            http_api_base: format!("http://{}/live", addr),
            ws_api_base: format!("ws://{}/ws", addr),
            responses,
            poll_hits,
            push_tx,
        }
    }

    /// Sets the body returned by this runner's status resource.
    pub fn set_poll_response(&self, login: &str, body: serde_json::Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(login.to_string(), body);
    }

    /// Number of status requests served for this runner so far.
    pub fn poll_count(&self, login: &str) -> usize {
        self.poll_hits.lock().unwrap().get(login).copied().unwrap_or(0)
    }

    /// Pushes one message to every connected stream subscriber.
    pub fn push(&self, body: &serde_json::Value) {
        let _ = self.push_tx.send(body.to_string());
    }

    /// Number of currently connected stream subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.push_tx.receiver_count()
    }
}

async fn live_handler(Path(login): Path<String>, State(state): State<MockState>) -> Response {
    *state.poll_hits.lock().unwrap().entry(login.clone()).or_insert(0) += 1;
    let body = state.responses.lock().unwrap().get(&login).cloned();
    match body {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<MockState>) -> impl IntoResponse {
    let mut rx = state.push_tx.subscribe();
    ws.on_upgrade(move |mut socket: WebSocket| async move {
        loop {
            tokio::select! {
                pushed = rx.recv() => {
                    let Ok(text) = pushed else { break };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                // Drop the broadcast receiver as soon as the subscriber goes
                // away, so subscriber_count() tracks live connections.
                incoming = socket.recv() => {
                    match incoming {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    })
}

/// A tracker configuration pointed at the mock upstream.
pub fn test_config(upstream: &MockUpstream, poll_interval: Duration) -> lib_tracker::Config {
    lib_tracker::Config {
        port: 0,
        http_api_base: upstream.http_api_base.clone(),
        ws_api_base: upstream.ws_api_base.clone(),
        poll_interval,
        request_timeout: Duration::from_secs(2),
        max_runners: 4,
        log_dir: std::path::PathBuf::from("./logs"),
        log_level: "debug".to_string(),
    }
}

/// Polls `cond` until it holds, panicking after ~5 seconds.
pub async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {}", what);
}
