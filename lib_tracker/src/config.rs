//! Layered configuration: built-in defaults, then an optional JSON config
//! file, then environment variables / CLI flags on top.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Partial configuration as read from any one source. `Some` values override
/// lower-priority sources during the merge.
#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Live run tracker gateway", version)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverlay {
    #[clap(long, env = "TRACKER_PORT", help = "Port for the snapshot endpoint.")]
    pub port: Option<u16>,

    #[clap(long, env = "TRACKER_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TRACKER_HTTP_API_BASE", help = "Base URL for per-runner status polling.")]
    pub http_api_base: Option<String>,

    #[clap(long, env = "TRACKER_WS_API_BASE", help = "URL of the live update WebSocket stream.")]
    pub ws_api_base: Option<String>,

    #[clap(long, env = "TRACKER_POLL_INTERVAL_SECS", help = "Fixed delay between poll cycles, in seconds.")]
    pub poll_interval_secs: Option<u64>,

    #[clap(long, env = "TRACKER_REQUEST_TIMEOUT_SECS", help = "Timeout for a single poll request, in seconds.")]
    pub request_timeout_secs: Option<u64>,

    #[clap(long, env = "TRACKER_MAX_RUNNERS", help = "Maximum number of tracked runners per session.")]
    pub max_runners: Option<usize>,

    #[clap(long, env = "TRACKER_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TRACKER_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,
}

impl ConfigOverlay {
    // Merge two overlays, where 'other' overrides 'self' for Some values
    fn merge(self, other: ConfigOverlay) -> ConfigOverlay {
        ConfigOverlay {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            http_api_base: other.http_api_base.or(self.http_api_base),
            ws_api_base: other.ws_api_base.or(self.ws_api_base),
            poll_interval_secs: other.poll_interval_secs.or(self.poll_interval_secs),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            max_runners: other.max_runners.or(self.max_runners),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub http_api_base: String,
    pub ws_api_base: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub max_runners: usize,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    fn from_overlay(overlay: ConfigOverlay) -> Config {
        Config {
            port: overlay.port.unwrap_or(8000),
            http_api_base: overlay
                .http_api_base
                .unwrap_or_else(|| "https://therun.gg/api/live".to_string()),
            ws_api_base: overlay
                .ws_api_base
                .unwrap_or_else(|| "wss://ws.therun.gg".to_string()),
            poll_interval: Duration::from_secs(overlay.poll_interval_secs.unwrap_or(30)),
            request_timeout: Duration::from_secs(overlay.request_timeout_secs.unwrap_or(10)),
            max_runners: overlay.max_runners.unwrap_or(4),
            log_dir: overlay.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: overlay.log_level.unwrap_or_else(|| "info".to_string()),
        }
    }
}

pub fn load_config() -> Config {
    // CLI/env first, to pick up a config_path override before reading the file.
    let cli_overlay = ConfigOverlay::parse();

    let config_file_path = cli_overlay
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_tracker.conf"));

    let mut overlay = ConfigOverlay::default();

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_overlay) = serde_json::from_str::<ConfigOverlay>(&config_str) {
                overlay = overlay.merge(file_overlay);
            } else {
                log::warn!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            log::warn!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    }

    // Environment variables and CLI arguments win over the file.
    Config::from_overlay(overlay.merge(cli_overlay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_an_empty_overlay() {
        let config = Config::from_overlay(ConfigOverlay::default());
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_runners, 4);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn later_overlay_wins_field_by_field() {
        let file = ConfigOverlay {
            port: Some(9000),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        let cli = ConfigOverlay {
            port: Some(9100),
            ..Default::default()
        };

        let config = Config::from_overlay(file.merge(cli));
        assert_eq!(config.port, 9100);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn config_file_layer_parses_camel_case_keys() {
        let overlay: ConfigOverlay = serde_json::from_str(
            r#"{ "port": 8080, "maxRunners": 6, "pollIntervalSecs": 15 }"#,
        )
        .unwrap();
        let config = Config::from_overlay(overlay);
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_runners, 6);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
    }
}
