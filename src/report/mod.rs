//! Run reporting.
//!
//! Counters describing what a run read, aligned and skipped, persisted next
//! to the dataset so a partial run can be inspected afterwards.

pub mod stats;

pub use stats::{create_shared_stats, RunStats, RunStatsSnapshot, SharedRunStats, STATS_FILE};
