//! Core alignment logic.
//!
//! This module contains:
//! - Timestamp normalization to second-resolution time of day
//! - Frame listing parsing and marker resolution
//! - Window construction around an event
//! - Per-second stream aggregation
//! - Severity banding and self-report handling
//! - The per-session event aligner

pub mod aligner;
pub mod frames;
pub mod self_report;
pub mod severity;
pub mod streams;
pub mod time_index;
pub mod windowing;

// Re-export commonly used types
pub use aligner::{
    mint_uid, AlignedEvent, AlignedSample, EventAligner, ExtractedStream, SampleSink,
    SessionData, SessionSummary, StreamData,
};
pub use frames::{resolve, FrameNaming, FrameRecord};
pub use self_report::{consensus_scores, derive_bands, Event};
pub use severity::{OutOfRangePolicy, SeverityBands, SeverityClass, SeverityClassifier};
pub use streams::{resample_physiological, SensorRecord, StreamExtractor};
pub use time_index::{normalize, ClockZone, RawTimestamp, TimeFormat, TimeOfDay};
pub use windowing::{TimeWindow, WindowBuilder};
