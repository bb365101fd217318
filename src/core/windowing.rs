//! Window construction around a resolved event.
//!
//! A window is the run of consecutive one-second timestamps from
//! `center - lookback` through `center + lookahead`, together with every
//! frame captured during one of those seconds.

use crate::core::frames::FrameRecord;
use crate::core::time_index::{TimeOfDay, SECONDS_PER_DAY};
use crate::error::AlignError;
use serde::Serialize;

/// The 1 Hz time span around one event.
#[derive(Debug, Clone, Serialize)]
pub struct TimeWindow {
    /// Truncated capture time of the resolved frame
    pub center: TimeOfDay,
    /// Strictly increasing, contiguous seconds; `seconds[lookback] == center`
    pub seconds: Vec<TimeOfDay>,
    /// Frames whose truncated capture time is one of `seconds`
    pub matched_frames: Vec<FrameRecord>,
    /// Number of leading seconds earlier than the session's first frame
    pub leading_uncovered: usize,
}

impl TimeWindow {
    /// First second of the window.
    pub fn start(&self) -> TimeOfDay {
        self.seconds.first().copied().unwrap_or(self.center)
    }

    /// Last second of the window.
    pub fn end(&self) -> TimeOfDay {
        self.seconds.last().copied().unwrap_or(self.center)
    }

    /// Check if a second belongs to this window.
    pub fn contains(&self, second: TimeOfDay) -> bool {
        second >= self.start() && second <= self.end()
    }

    /// Number of seconds in the window.
    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    /// Seconds that lie inside the recorded session.
    pub fn covered_seconds(&self) -> &[TimeOfDay] {
        &self.seconds[self.leading_uncovered..]
    }

    /// Check if a second belongs to the part of the window inside the
    /// recorded session.
    pub fn covers(&self, second: TimeOfDay) -> bool {
        self.covered_seconds()
            .first()
            .map_or(false, |start| second >= *start && second <= self.end())
    }
}

/// Builds windows with a fixed lookback and lookahead.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    lookback_secs: u32,
    lookahead_secs: u32,
}

impl WindowBuilder {
    pub fn new(lookback_secs: u32, lookahead_secs: u32) -> Self {
        Self {
            lookback_secs,
            lookahead_secs,
        }
    }

    /// Window length in seconds, center included.
    pub fn window_len(&self) -> usize {
        self.lookback_secs as usize + self.lookahead_secs as usize + 1
    }

    /// Build the window around `resolved`, matching frames from `frames`.
    pub fn build(
        &self,
        frames: &[FrameRecord],
        resolved: &FrameRecord,
    ) -> Result<TimeWindow, AlignError> {
        let center = resolved.second();
        let seconds = self.seconds_around(center)?;

        let mut window = TimeWindow {
            center,
            seconds,
            matched_frames: Vec::new(),
            leading_uncovered: 0,
        };

        let mut matched: Vec<FrameRecord> = frames
            .iter()
            .filter(|frame| window.contains(frame.second()))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            (a.second(), a.index, &a.file_name).cmp(&(b.second(), b.index, &b.file_name))
        });
        window.matched_frames = matched;

        if let Some(session_start) = frames.iter().map(FrameRecord::second).min() {
            window.leading_uncovered = window
                .seconds
                .iter()
                .take_while(|second| **second < session_start)
                .count();
        }

        Ok(window)
    }

    /// The ordered seconds from `center - lookback` to `center + lookahead`.
    ///
    /// Walks backward from `center - 1s`, inserts the center once, then walks
    /// forward to `center + lookahead`. Fails if any second leaves the day.
    pub fn seconds_around(&self, center: TimeOfDay) -> Result<Vec<TimeOfDay>, AlignError> {
        let crosses = || AlignError::WindowCrossesMidnight {
            center: center.to_string(),
        };

        if self.window_len() > SECONDS_PER_DAY as usize {
            return Err(crosses());
        }

        let mut seconds = Vec::with_capacity(self.window_len());

        for step in 1..=i64::from(self.lookback_secs) {
            seconds.push(center.checked_offset(-step).ok_or_else(crosses)?);
        }
        seconds.reverse();

        seconds.push(center);

        for step in 1..=i64::from(self.lookahead_secs) {
            seconds.push(center.checked_offset(step).ok_or_else(crosses)?);
        }

        Ok(seconds)
    }
}
