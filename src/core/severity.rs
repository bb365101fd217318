//! Severity classification of self-reported sickness scores.
//!
//! The admissible score range `[min, max]` is split by three ascending cut
//! points into four bands:
//!
//! ```text
//!  [min, low]   (low, medium]   (medium, high]   (high, max]
//!      0              1                2              3
//! ```
//!
//! A cut point belongs to the band below it.

use crate::error::AlignError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete sickness severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityClass {
    None = 0,
    Low = 1,
    Moderate = 2,
    High = 3,
}

impl SeverityClass {
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ordinal())
    }
}

/// The three ascending cut points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            low: 0.66,
            medium: 1.0,
            high: 2.0,
        }
    }
}

/// What to do with a score outside `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Skip the event and log a warning
    #[default]
    Skip,
    /// Keep the event with an empty class
    Unclassified,
}

#[derive(Debug, Clone, Copy)]
struct Band {
    class: SeverityClass,
    lower: f64,
    lower_inclusive: bool,
    upper: f64,
}

impl Band {
    fn contains(&self, score: f64) -> bool {
        let above = if self.lower_inclusive {
            score >= self.lower
        } else {
            score > self.lower
        };
        above && score <= self.upper
    }
}

/// Ordered, mutually exclusive band table.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    bands: [Band; 4],
    min: f64,
    max: f64,
}

impl SeverityClassifier {
    /// Build a classifier; requires `min <= low < medium < high <= max`.
    pub fn new(bounds: SeverityBands, min: f64, max: f64) -> Result<Self, AlignError> {
        let cuts = [min, bounds.low, bounds.medium, bounds.high, max];
        if cuts.iter().any(|c| !c.is_finite()) {
            return Err(AlignError::InvalidBands(format!(
                "non-finite bound in {cuts:?}"
            )));
        }
        if !(min <= bounds.low && bounds.low < bounds.medium && bounds.medium < bounds.high)
            || bounds.high > max
        {
            return Err(AlignError::InvalidBands(format!(
                "expected min <= low < medium < high <= max, got {min} / {} / {} / {} / {max}",
                bounds.low, bounds.medium, bounds.high
            )));
        }

        let band = |class, lower, lower_inclusive, upper| Band {
            class,
            lower,
            lower_inclusive,
            upper,
        };

        Ok(Self {
            bands: [
                band(SeverityClass::None, min, true, bounds.low),
                band(SeverityClass::Low, bounds.low, false, bounds.medium),
                band(SeverityClass::Moderate, bounds.medium, false, bounds.high),
                band(SeverityClass::High, bounds.high, false, max),
            ],
            min,
            max,
        })
    }

    /// Map a continuous score to its band.
    pub fn classify(&self, score: f64) -> Result<SeverityClass, AlignError> {
        self.bands
            .iter()
            .find(|band| band.contains(score))
            .map(|band| band.class)
            .ok_or(AlignError::ScoreOutOfRange {
                score,
                min: self.min,
                max: self.max,
            })
    }

    /// Classify under a run-wide out-of-range policy.
    ///
    /// `Ok(None)` means the event is kept without a class.
    pub fn classify_with(
        &self,
        score: f64,
        policy: OutOfRangePolicy,
    ) -> Result<Option<SeverityClass>, AlignError> {
        match (self.classify(score), policy) {
            (Ok(class), _) => Ok(Some(class)),
            (Err(AlignError::ScoreOutOfRange { .. }), OutOfRangePolicy::Unclassified) => Ok(None),
            (Err(e), _) => Err(e),
        }
    }
}
