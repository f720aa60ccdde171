//! Session lifecycle for the live-update machinery.
//!
//! A session owns one stream listener plus one poll worker per tracked runner,
//! all spawned into a `JoinSet` and cancelled over a broadcast shutdown
//! channel. A monitor task watches for terminal events: a stream failure is a
//! capability downgrade (pollers continue as the fallback channel), while a
//! panicked worker is unrecoverable and stops the remaining tasks. Neither
//! case tears down the store; accumulated records stay readable until the
//! session is ended or replaced.

use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::ingestors::{PollWorker, StreamListener};
use crate::state::TrackerState;

/// How one background task of the session ended.
enum TaskExit {
    Stream(Result<(), crate::ingestors::StreamError>),
    Poller(String),
}

struct Session {
    shutdown_tx: broadcast::Sender<()>,
    monitor: tokio::task::JoinHandle<()>,
}

pub struct Supervisor {
    config: Config,
    state: TrackerState,
    client: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl Supervisor {
    pub fn new(config: Config, state: TrackerState) -> anyhow::Result<Self> {
        // One client for all poll workers, so they share a connection pool.
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("RunTracker/1.0")
            .build()
            .context("building the shared HTTP client")?;

        Ok(Self {
            config,
            state,
            client,
            session: Mutex::new(None),
        })
    }

    /// Replaces the tracked set (bounded to the configured maximum), clears
    /// prior records, and spawns the update machinery. An already-running
    /// session is ended first. Returns the canonical tracked logins; if none
    /// survive canonicalization, nothing is spawned.
    pub async fn begin_session(&self, logins: Vec<String>) -> Vec<String> {
        self.end_session().await;

        self.state.set_tracked(&logins, self.config.max_runners);
        let tracked = self.state.tracked_logins();
        if tracked.is_empty() {
            return tracked;
        }

        log::info!("Tracking session started for {:?}", tracked);

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut tasks: JoinSet<TaskExit> = JoinSet::new();

        let listener = StreamListener::new(&self.config, self.state.clone());
        let listener_shutdown = shutdown_tx.subscribe();
        tasks.spawn(async move { TaskExit::Stream(listener.run(listener_shutdown).await) });

        for login in &tracked {
            let worker = PollWorker::new(
                login.clone(),
                &self.config,
                self.state.clone(),
                self.client.clone(),
            );
            let worker_shutdown = shutdown_tx.subscribe();
            let login = login.clone();
            tasks.spawn(async move {
                worker.run(worker_shutdown).await;
                TaskExit::Poller(login)
            });
        }

        let monitor = tokio::spawn(monitor_session(tasks, shutdown_tx.clone()));

        self.session.lock().await.replace(Session {
            shutdown_tx,
            monitor,
        });
        tracked
    }

    /// Cancels all session tasks, waits for them to exit, then clears the
    /// store and tracked set.
    pub async fn end_session(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            let _ = session.shutdown_tx.send(());
            let _ = session.monitor.await;
            log::info!("Tracking session stopped.");
        }
        self.state.clear();
    }

    pub async fn session_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Fixed delay between poll cycles, exposed for status reporting.
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

/// Drains the session's tasks as they finish. A stream failure or a poller
/// exit is logged and tolerated; a panicked task cancels the rest over the
/// shutdown channel. The store is never touched either way.
async fn monitor_session(mut tasks: JoinSet<TaskExit>, shutdown_tx: broadcast::Sender<()>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TaskExit::Stream(Err(e))) => {
                log::warn!("Live stream lost: {}. Continuing in poll-only mode.", e);
            }
            Ok(TaskExit::Stream(Ok(()))) => {
                log::debug!("Stream listener exited cleanly.");
            }
            Ok(TaskExit::Poller(login)) => {
                log::debug!("Poll worker for '{}' exited.", login);
            }
            Err(e) => {
                log::error!(
                    "Tracker task failed unrecoverably: {}. Stopping live updates.",
                    e
                );
                let _ = shutdown_tx.send(());
            }
        }
    }
    log::debug!("All session tasks finished.");
}
