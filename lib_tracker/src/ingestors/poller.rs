//! Per-runner poll worker: the pull fallback channel.
//!
//! One worker per tracked runner. Each cycle issues a single GET for that
//! runner's current status, merges the response through the shared merge path,
//! and sleeps for the fixed poll interval. A failed or malformed cycle is
//! logged and skipped; there is no immediate retry and no backoff. The loop
//! ends only on supervisor shutdown, or when the merge reports the runner has
//! left the tracked set.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::model::{RunnerUpdate, UpdateSource};
use crate::state::{MergeOutcome, TrackerState};

pub struct PollWorker {
    login: String,
    url: String,
    interval: Duration,
    state: TrackerState,
    client: reqwest::Client,
}

impl PollWorker {
    /// `login` must already be canonical (the supervisor spawns workers from
    /// the tracked set, which is).
    pub fn new(login: String, config: &Config, state: TrackerState, client: reqwest::Client) -> Self {
        let url = format!("{}/{}", config.http_api_base.trim_end_matches('/'), login);
        Self {
            login,
            url,
            interval: config.poll_interval,
            state,
            client,
        }
    }

    /// Poll loop. The first request goes out immediately; the interval sleep
    /// follows each cycle. Both suspension points honor shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::debug!("Poll worker for '{}' shutting down.", self.login);
                    return;
                }
                result = self.poll_once() => {
                    match result {
                        Ok(MergeOutcome::Applied) => {}
                        Ok(MergeOutcome::Untracked) => {
                            log::info!("'{}' left the tracked set; poll worker stopping.", self.login);
                            return;
                        }
                        Ok(MergeOutcome::MissingLogin) => {
                            log::warn!("Status response for '{}' carried no login; cycle skipped.", self.login);
                        }
                        Err(e) => {
                            log::warn!("Polling error for '{}': {}. Cycle skipped.", self.login, e);
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    log::debug!("Poll worker for '{}' shutting down.", self.login);
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    async fn poll_once(&self) -> anyhow::Result<MergeOutcome> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let update = response.json::<RunnerUpdate>().await?;
        Ok(self.state.apply_update(UpdateSource::Poll, &update))
    }
}
