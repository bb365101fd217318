//! Sickness Align - event alignment for simulator sickness datasets.
//!
//! This library turns raw simulator recordings (frame listings, eye and head
//! tracking, wristband physiology) and sparse self-reported sickness ratings
//! into a labelled dataset: one fixed-length, per-second window of every
//! stream for each rating, tagged with a discrete severity class.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Sickness Align                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Readers   │──▶│    Frame    │──▶│   Window    │        │
//! │  │ (raw files) │   │  Resolver   │   │   Builder   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                                             │                │
//! │                                             ▼                │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Metadata   │◀──│  Severity   │◀──│   Stream    │        │
//! │  │   Table     │   │ Classifier  │   │  Extractor  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sickness_align::{config::Config, pipeline, report::RunStats};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = Config::default();
//! let stats = RunStats::new();
//! let running = AtomicBool::new(true);
//!
//! pipeline::run_alignment(&config, &stats, &running).expect("alignment failed");
//! println!("{}", stats.summary());
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod store;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    EventAligner, SeverityBands, SeverityClass, SeverityClassifier, TimeOfDay, TimeWindow,
    WindowBuilder,
};
pub use error::AlignError;
pub use report::{RunStats, RunStatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
