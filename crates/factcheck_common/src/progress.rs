//! Run progress for pipeline visibility.
//!
//! A run id maps to an ordered list of progress events that a client can
//! poll while the run is in flight. Entries expire 10 minutes after their
//! last update; each run keeps only its most recent 200 events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub const PROGRESS_TTL: Duration = Duration::from_secs(10 * 60);
pub const MAX_EVENTS: usize = 200;

/// Stage of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    SourceMatch,
    Claim,
    Search,
    Verdict,
    Run,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMatch => write!(f, "source_match"),
            Self::Claim => write!(f, "claim"),
            Self::Search => write!(f, "search"),
            Self::Verdict => write!(f, "verdict"),
            Self::Run => write!(f, "run"),
        }
    }
}

/// Progress event during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub ts: DateTime<Utc>,
    pub stage: RunStage,
    pub message: String,
    /// Elapsed time since the run started (ms)
    pub elapsed_ms: u64,
}

impl ProgressEvent {
    pub fn new(stage: RunStage, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            ts: Utc::now(),
            stage,
            message: message.into(),
            elapsed_ms,
        }
    }
}

/// Snapshot returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub events: Vec<ProgressEvent>,
    pub done: bool,
    pub error: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RunProgress {
    events: Vec<ProgressEvent>,
    done: bool,
    error: String,
    updated_at: DateTime<Utc>,
}

impl RunProgress {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            events: Vec::new(),
            done: false,
            error: String::new(),
            updated_at: now,
        }
    }
}

/// In-memory progress store shared by concurrent runs
#[derive(Default)]
pub struct ProgressStore {
    runs: Mutex<HashMap<String, RunProgress>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) tracking a run.
    pub fn init(&self, run_id: &str) {
        if run_id.is_empty() {
            return;
        }
        self.lock().insert(run_id.to_string(), RunProgress::new(Utc::now()));
    }

    pub fn push(&self, run_id: &str, event: ProgressEvent) {
        if run_id.is_empty() || event.message.is_empty() {
            return;
        }
        let now = Utc::now();
        let mut runs = self.lock();
        let entry = runs
            .entry(run_id.to_string())
            .or_insert_with(|| RunProgress::new(now));
        entry.events.push(event);
        if entry.events.len() > MAX_EVENTS {
            let overflow = entry.events.len() - MAX_EVENTS;
            entry.events.drain(..overflow);
        }
        entry.updated_at = now;
        Self::prune(&mut runs, now);
    }

    pub fn complete(&self, run_id: &str) {
        self.finish(run_id, String::new());
    }

    pub fn fail(&self, run_id: &str, error: &str) {
        let error = if error.is_empty() { "failed" } else { error };
        self.finish(run_id, error.to_string());
    }

    fn finish(&self, run_id: &str, error: String) {
        if run_id.is_empty() {
            return;
        }
        let now = Utc::now();
        let mut runs = self.lock();
        let entry = runs
            .entry(run_id.to_string())
            .or_insert_with(|| RunProgress::new(now));
        entry.done = true;
        entry.error = error;
        entry.updated_at = now;
    }

    /// Snapshot of a run. Unknown runs report done with `not_found`.
    pub fn get(&self, run_id: &str) -> ProgressSnapshot {
        let now = Utc::now();
        let mut runs = self.lock();
        Self::prune(&mut runs, now);
        match runs.get(run_id) {
            Some(entry) => ProgressSnapshot {
                events: entry.events.clone(),
                done: entry.done,
                error: entry.error.clone(),
                updated_at: entry.updated_at,
            },
            None => ProgressSnapshot {
                events: Vec::new(),
                done: true,
                error: "not_found".to_string(),
                updated_at: now,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(runs: &mut HashMap<String, RunProgress>, now: DateTime<Utc>) {
        let ttl = chrono::Duration::from_std(PROGRESS_TTL).unwrap_or_else(|_| chrono::Duration::minutes(10));
        let cutoff = now - ttl;
        runs.retain(|_, entry| entry.updated_at >= cutoff);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RunProgress>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
