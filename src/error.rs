//! Error types for event alignment.

use thiserror::Error;

/// Errors raised while aligning self-report events with sensor streams.
///
/// Event-local variants (`FrameNotFound`, `ScoreOutOfRange`,
/// `WindowCrossesMidnight`) abort a single event. Input-level variants
/// (`MalformedTimestamp`, `MissingColumn`, `Io`, `Csv`) abort the session
/// whose files produced them.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Malformed timestamp '{raw}' (expected {expected})")]
    MalformedTimestamp { raw: String, expected: String },

    #[error("No frame found for marker {marker}")]
    FrameNotFound { marker: i64 },

    #[error("Severity score {score} outside admissible range [{min}, {max}]")]
    ScoreOutOfRange { score: f64, min: f64, max: f64 },

    #[error("Stream '{stream}' has no samples inside the window centred at {center}")]
    EmptyWindowResult { stream: String, center: String },

    #[error("Window around {center} crosses midnight")]
    WindowCrossesMidnight { center: String },

    #[error("Invalid severity bands: {0}")]
    InvalidBands(String),

    #[error("Missing column '{column}' in {file}")]
    MissingColumn { column: String, file: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AlignError {
    pub(crate) fn malformed(raw: impl Into<String>, expected: impl Into<String>) -> Self {
        AlignError::MalformedTimestamp {
            raw: raw.into(),
            expected: expected.into(),
        }
    }
}
