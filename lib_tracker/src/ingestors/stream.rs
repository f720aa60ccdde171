//! Stream listener: the push channel.
//!
//! One connection per session, subscribed once and receiving updates for all
//! runners. Messages are demultiplexed by login and fed through the shared
//! merge path; updates for untracked logins are discarded silently. The
//! listener does not reconnect: a transport failure is returned to the
//! supervisor, which degrades the session to poll-only.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite};

use crate::config::Config;
use crate::model::{RunnerUpdate, UpdateSource};
use crate::state::{MergeOutcome, TrackerState};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("websocket connect failed: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("websocket transport error: {0}")]
    Transport(#[source] tungstenite::Error),
    #[error("websocket closed by remote host")]
    Closed,
}

pub struct StreamListener {
    url: String,
    state: TrackerState,
}

impl StreamListener {
    pub fn new(config: &Config, state: TrackerState) -> Self {
        Self {
            url: config.ws_api_base.clone(),
            state,
        }
    }

    /// Connects once and pumps messages until shutdown or failure.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), StreamError> {
        log::info!("Connecting to live stream: {}", self.url);

        let (ws_stream, _) = tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            connected = connect_async(self.url.as_str()) => connected.map_err(StreamError::Connect)?,
        };
        log::info!("Live stream connected.");

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let _ = write.close().await;
                    log::debug!("Stream listener shutting down.");
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            self.handle_message(text.as_str());
                        }
                        Some(Ok(tungstenite::Message::Close(_))) | None => {
                            return Err(StreamError::Closed);
                        }
                        Some(Err(e)) => {
                            return Err(StreamError::Transport(e));
                        }
                        // Binary frames, pings and pongs are not part of the
                        // update protocol.
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        let update = match serde_json::from_str::<RunnerUpdate>(text) {
            Ok(update) => update,
            Err(e) => {
                log::debug!("Discarding malformed stream message: {}", e);
                return;
            }
        };

        match self.state.apply_update(UpdateSource::Stream, &update) {
            MergeOutcome::Applied | MergeOutcome::Untracked => {}
            MergeOutcome::MissingLogin => {
                log::debug!("Stream message carried no login; discarded.");
            }
        }
    }
}
