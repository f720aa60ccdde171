//! Shared state store for the live tracker.
//!
//! One in-memory table of canonical login -> latest [`RunnerRecord`], plus the
//! bounded tracked set, behind a single exclusive lock. Every operation is a
//! short, non-suspending critical section, so the lock is a plain
//! `std::sync::Mutex` rather than an async one. The merge of an incoming
//! partial update is performed entirely inside the lock; two concurrent merges
//! for the same login can never interleave their read-modify-write.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::model::{RunnerRecord, RunnerSnapshot, RunnerUpdate, UpdateSource};

/// Result of feeding one update through the shared merge path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record for the login was replaced with the merged result.
    Applied,
    /// The login is not in the tracked set; the store was not touched.
    Untracked,
    /// The payload carried no login and was discarded.
    MissingLogin,
}

/// Cloneable handle to the single shared store.
#[derive(Clone)]
pub struct TrackerState {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    /// Canonical logins in session order; also the snapshot order.
    order: Vec<String>,
    tracked: HashSet<String>,
    runs: HashMap<String, RunnerRecord>,
}

/// Logins are case-insensitive; everything is compared in this form.
pub fn canonical_login(login: &str) -> String {
    login.trim().to_lowercase()
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                order: Vec::new(),
                tracked: HashSet::new(),
                runs: HashMap::new(),
            })),
        }
    }

    /// Replaces the tracked set wholesale, dropping all accumulated records.
    ///
    /// Logins are canonicalized and deduplicated; at most `limit` are kept,
    /// in first-seen order. Empty entries are skipped.
    pub fn set_tracked(&self, logins: &[String], limit: usize) {
        let mut inner = self.lock();
        inner.order.clear();
        inner.tracked.clear();
        inner.runs.clear();

        for login in logins {
            let login = canonical_login(login);
            if login.is_empty() || inner.tracked.contains(&login) {
                continue;
            }
            if inner.order.len() >= limit {
                break;
            }
            inner.tracked.insert(login.clone());
            inner.order.push(login);
        }
    }

    /// Empties the tracked set and all records (session end).
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.order.clear();
        inner.tracked.clear();
        inner.runs.clear();
    }

    pub fn is_tracked(&self, login: &str) -> bool {
        self.lock().tracked.contains(&canonical_login(login))
    }

    /// The tracked logins in session order.
    pub fn tracked_logins(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    pub fn get(&self, login: &str) -> Option<RunnerRecord> {
        self.lock().runs.get(&canonical_login(login)).cloned()
    }

    /// A record tagged with its canonical login, for the per-runner view.
    pub fn get_snapshot(&self, login: &str) -> Option<RunnerSnapshot> {
        let login = canonical_login(login);
        self.lock().runs.get(&login).map(|record| RunnerSnapshot {
            login: login.clone(),
            record: record.clone(),
        })
    }

    /// Point-in-time copy of all current records, in tracked order.
    ///
    /// The returned value is detached from the store; later merges do not
    /// affect it.
    pub fn get_all(&self) -> Vec<RunnerSnapshot> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|login| {
                inner.runs.get(login).map(|record| RunnerSnapshot {
                    login: login.clone(),
                    record: record.clone(),
                })
            })
            .collect()
    }

    /// The shared merge path for both ingestion channels.
    ///
    /// Read-existing, compute-new, and write-new happen as one critical
    /// section, and the record is replaced as a whole. Field policy: incoming
    /// value if present, else the previous record's value, else the literal
    /// first-insertion default. `finished` is recomputed fresh from the
    /// incoming completion fraction (absent means 0.0, not "keep previous").
    pub fn apply_update(&self, source: UpdateSource, update: &RunnerUpdate) -> MergeOutcome {
        let Some(login) = update.login.as_deref() else {
            return MergeOutcome::MissingLogin;
        };
        let login = canonical_login(login);

        let mut inner = self.lock();
        if !inner.tracked.contains(&login) {
            return MergeOutcome::Untracked;
        }

        let merged = merge_record(source, inner.runs.get(&login), update);
        log::trace!("Merged {:?} update for '{}'", source, login);
        inner.runs.insert(login, merged);
        MergeOutcome::Applied
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("tracker state lock poisoned")
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_record(
    source: UpdateSource,
    existing: Option<&RunnerRecord>,
    update: &RunnerUpdate,
) -> RunnerRecord {
    RunnerRecord {
        current_time: update
            .current_time
            .or(existing.map(|r| r.current_time))
            .unwrap_or(0.0),
        inserted_at: update
            .inserted_at
            .map(|v| v as i64)
            .or(existing.map(|r| r.inserted_at))
            .unwrap_or(0),
        split_index: update
            .current_split_index
            .or(existing.map(|r| r.split_index))
            .unwrap_or_else(|| source.initial_split_index()),
        finished: update.run_percentage.unwrap_or(0.0) >= 1.0,
        current_split_name: update
            .current_split_name
            .clone()
            .or_else(|| existing.map(|r| r.current_split_name.clone()))
            .unwrap_or_default(),
        delta: update.delta.or(existing.map(|r| r.delta)).unwrap_or(0.0),
        best_possible: update
            .best_possible
            .or(existing.map(|r| r.best_possible))
            .unwrap_or(0.0),
        pb: update.pb.or(existing.map(|r| r.pb)).unwrap_or(0.0),
    }
}
