//! Snapshot endpoint and session control surface.
//!
//! Read path: `/data.json` serializes the store on every request (no cache in
//! front; responses carry cache-suppression headers so overlays always see
//! fresh data) and `/runner/{login}` resolves one runner's record for the
//! per-runner overlay view. Write path: `/session/start` and `/session/stop`
//! drive the supervisor. The store itself is never mutated by the read path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::state::TrackerState;
use crate::supervisor::Supervisor;

#[derive(Clone)]
pub struct AppState {
    pub state: TrackerState,
    pub supervisor: Arc<Supervisor>,
}

#[derive(Debug, Deserialize)]
pub struct SessionStartRequest {
    pub runners: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SessionStartResponse {
    tracked: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    session_active: bool,
    poll_interval_secs: u64,
}

// Overlays poll this; intermediaries must never serve a stale body.
fn no_store() -> [(header::HeaderName, &'static str); 1] {
    [(header::CACHE_CONTROL, "no-store, must-revalidate")]
}

pub fn router(app: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/data.json", get(data_handler))
        .route("/runner/{login}", get(runner_handler))
        .route("/session/start", post(session_start_handler))
        .route("/session/stop", post(session_stop_handler))
        .layer(cors)
        .with_state(app)
}

pub async fn run(
    config: Config,
    app: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Snapshot endpoint listening on http://{}", addr);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Snapshot endpoint shutting down.");
        })
        .await?;
    Ok(())
}

async fn health_handler(State(app): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        session_active: app.supervisor.session_active().await,
        poll_interval_secs: app.supervisor.poll_interval().as_secs(),
    })
}

async fn data_handler(State(app): State<AppState>) -> impl IntoResponse {
    (no_store(), Json(app.state.get_all()))
}

async fn runner_handler(Path(login): Path<String>, State(app): State<AppState>) -> Response {
    match app.state.get_snapshot(&login) {
        Some(snapshot) => (no_store(), Json(snapshot)).into_response(),
        None => (StatusCode::NOT_FOUND, "runner not tracked").into_response(),
    }
}

async fn session_start_handler(
    State(app): State<AppState>,
    Json(request): Json<SessionStartRequest>,
) -> Response {
    if request.runners.iter().all(|r| r.trim().is_empty()) {
        return (StatusCode::BAD_REQUEST, "no runner names given").into_response();
    }

    let tracked = app.supervisor.begin_session(request.runners).await;
    Json(SessionStartResponse { tracked }).into_response()
}

async fn session_stop_handler(State(app): State<AppState>) -> impl IntoResponse {
    app.supervisor.end_session().await;
    StatusCode::NO_CONTENT
}
