//! Frame listing parsing and marker resolution.
//!
//! The simulator's frame grabber names every capture
//! `<prefix><index>-<time>.<ext>`, for example `Frame-120-10-15-30-500.png`:
//! frame 120 captured at 10:15:30.500.

use crate::core::time_index::TimeOfDay;
use crate::error::AlignError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One captured video frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRecord {
    /// Monotonically assigned frame index
    pub index: u64,
    /// File name inside the session's frame directory
    pub file_name: String,
    /// Capture time with sub-second precision
    pub captured_at: NaiveTime,
}

impl FrameRecord {
    /// Capture time truncated to its second.
    pub fn second(&self) -> TimeOfDay {
        TimeOfDay::from_time(self.captured_at)
    }
}

/// How frame files are named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameNaming {
    /// Directory holding the frames, relative to the session directory
    pub directory: String,
    /// Literal prefix before the frame index
    pub prefix: String,
    /// Pattern of the embedded capture time
    pub time_pattern: String,
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            directory: "Frames".to_string(),
            prefix: "Frame-".to_string(),
            time_pattern: "%H-%M-%S-%f".to_string(),
        }
    }
}

impl FrameNaming {
    /// Parse a frame file name. Returns `Ok(None)` for files that do not
    /// carry the frame prefix.
    pub fn parse(&self, file_name: &str) -> Result<Option<FrameRecord>, AlignError> {
        let Some(rest) = file_name.strip_prefix(&self.prefix) else {
            return Ok(None);
        };

        let stem = match rest.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => rest,
        };

        let expected = || format!("{}<index>-{}", self.prefix, self.time_pattern);
        let (index, time) = stem
            .split_once('-')
            .ok_or_else(|| AlignError::malformed(file_name, expected()))?;
        let index = index
            .parse::<u64>()
            .map_err(|_| AlignError::malformed(file_name, expected()))?;

        let captured_at = NaiveTime::parse_from_str(time, &self.time_pattern)
            .map_err(|_| AlignError::malformed(file_name, expected()))?;

        Ok(Some(FrameRecord {
            index,
            file_name: file_name.to_string(),
            captured_at,
        }))
    }
}

/// Find the frame whose index equals `marker`.
///
/// Self-report markers are whole frame indices. Should the listing contain
/// the same index twice, the lexicographically smallest file name wins so
/// that the result does not depend on directory enumeration order.
pub fn resolve(frames: &[FrameRecord], marker: i64) -> Result<&FrameRecord, AlignError> {
    let mut matches = frames
        .iter()
        .filter(|frame| i64::try_from(frame.index).map_or(false, |index| index == marker));

    let first = matches.next().ok_or(AlignError::FrameNotFound { marker })?;
    let mut chosen = first;
    let mut duplicates = 0usize;
    for candidate in matches {
        duplicates += 1;
        if candidate.file_name < chosen.file_name {
            chosen = candidate;
        }
    }

    if duplicates > 0 {
        warn!(
            marker,
            duplicates,
            chosen = %chosen.file_name,
            "Several frames share one index; using the smallest file name"
        );
    }

    Ok(chosen)
}
