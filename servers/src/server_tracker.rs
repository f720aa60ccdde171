//! # Live Run Tracker Gateway
//!
//! Launches the run tracker: the Live State Synchronizer (shared store, stream
//! listener, poll workers, supervisor) behind an HTTP snapshot endpoint.
//! Tracking sessions are started and stopped over `/session/start` and
//! `/session/stop`; overlays read `/data.json` and `/runner/{login}`.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;

use lib_tracker::server::{self, AppState};
use lib_tracker::{config, logger, Supervisor, TrackerState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir, &config.log_level)?;
    log::info!(
        "Live run tracker booting (max {} runners, poll every {}s).",
        config.max_runners,
        config.poll_interval.as_secs()
    );

    let state = TrackerState::new();
    let supervisor = Arc::new(Supervisor::new(config.clone(), state.clone())?);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let app = AppState {
        state: state.clone(),
        supervisor: supervisor.clone(),
    };
    let server_handle = tokio::spawn(server::run(config, app, shutdown_tx.subscribe()));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install signal handler");
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Stop the update machinery first, then the web server.
    supervisor.end_session().await;
    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    log::info!("Shutdown complete.");
    Ok(())
}
