//! Run statistics.

use crate::core::aligner::SessionSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// File name of the persisted statistics, next to the metadata table.
pub const STATS_FILE: &str = "run_stats.json";

/// Counters for one alignment run.
#[derive(Debug)]
pub struct RunStats {
    /// Sessions aligned without a session-level failure
    sessions_processed: AtomicU64,
    /// Sessions whose inputs could not be loaded
    sessions_failed: AtomicU64,
    events_seen: AtomicU64,
    events_aligned: AtomicU64,
    events_skipped: AtomicU64,
    artifacts_written: AtomicU64,
    run_start: DateTime<Utc>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            sessions_processed: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            events_seen: AtomicU64::new(0),
            events_aligned: AtomicU64::new(0),
            events_skipped: AtomicU64::new(0),
            artifacts_written: AtomicU64::new(0),
            run_start: Utc::now(),
        }
    }

    /// Record the outcome of one processed session.
    pub fn record_session(&self, summary: &SessionSummary) {
        self.sessions_processed.fetch_add(1, Ordering::Relaxed);
        self.events_seen
            .fetch_add(summary.events as u64, Ordering::Relaxed);
        self.events_aligned
            .fetch_add(summary.aligned as u64, Ordering::Relaxed);
        self.events_skipped
            .fetch_add(summary.skipped as u64, Ordering::Relaxed);
        self.artifacts_written
            .fetch_add(summary.artifacts as u64, Ordering::Relaxed);
    }

    /// Record a session that could not be loaded.
    pub fn record_session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            sessions_processed: self.sessions_processed.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_aligned: self.events_aligned.load(Ordering::Relaxed),
            events_skipped: self.events_skipped.load(Ordering::Relaxed),
            artifacts_written: self.artifacts_written.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Sessions processed: {}\n\
             - Sessions failed: {}\n\
             - Events seen: {}\n\
             - Events aligned: {}\n\
             - Events skipped: {}\n\
             - Artifacts written: {}\n\
             - Run duration: {} seconds",
            stats.sessions_processed,
            stats.sessions_failed,
            stats.events_seen,
            stats.events_aligned,
            stats.events_skipped,
            stats.artifacts_written,
            stats.run_duration_secs
        )
    }

    /// Save stats to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.stats()).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatsSnapshot {
    pub sessions_processed: u64,
    pub sessions_failed: u64,
    pub events_seen: u64,
    pub events_aligned: u64,
    pub events_skipped: u64,
    pub artifacts_written: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Run statistics shared with the interrupt handler.
pub type SharedRunStats = Arc<RunStats>;

pub fn create_shared_stats() -> SharedRunStats {
    Arc::new(RunStats::new())
}
