//! Wire and storage types for runner live data.
//!
//! Incoming payloads (poll responses and stream messages) share one partial
//! shape, [`RunnerUpdate`]; the store keeps one full [`RunnerRecord`] per
//! tracked runner.

use serde::{Deserialize, Serialize};

/// Which channel an update arrived on.
///
/// The two channels use different first-seen defaults for the split index
/// (0 via poll, -1 via stream). Kept as observed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Poll,
    Stream,
}

impl UpdateSource {
    /// Split index assigned on first insertion when the payload carries none.
    pub fn initial_split_index(self) -> i64 {
        match self {
            UpdateSource::Poll => 0,
            UpdateSource::Stream => -1,
        }
    }
}

/// The authoritative latest-known state for one runner.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerRecord {
    /// Elapsed run time at the last update, in seconds.
    pub current_time: f64,
    /// Source timestamp of the last update, coerced to an integer.
    pub inserted_at: i64,
    /// Current checkpoint index within the run.
    pub split_index: i64,
    /// Derived: true iff the most recent completion fraction was >= 1.0.
    /// Recomputed on every merge, never inherited.
    pub finished: bool,
    pub current_split_name: String,
    pub delta: f64,
    pub best_possible: f64,
    pub pb: f64,
}

/// A partial status payload as delivered by the remote service.
///
/// Every field is optional; the merge in [`crate::state`] fills gaps from the
/// previous record. `inserted_at` is accepted as any JSON number and coerced.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerUpdate {
    pub login: Option<String>,
    pub current_time: Option<f64>,
    pub inserted_at: Option<f64>,
    pub current_split_index: Option<i64>,
    pub run_percentage: Option<f64>,
    pub current_split_name: Option<String>,
    pub delta: Option<f64>,
    pub best_possible: Option<f64>,
    pub pb: Option<f64>,
}

/// A record tagged with its canonical login, as served by the snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerSnapshot {
    pub login: String,
    #[serde(flatten)]
    pub record: RunnerRecord,
}
