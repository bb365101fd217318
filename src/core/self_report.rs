//! Self-reported sickness ratings.
//!
//! Participants are asked for a sickness rating at fixed points during a
//! simulation. Besides the individual rating (CS), each event carries the
//! group consensus score (CSG): the mean rating of every participant of the
//! same simulation at the same elicitation.

use crate::core::severity::SeverityBands;
use crate::core::time_index::TimeOfDay;
use crate::error::AlignError;
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics};

/// One elicitation of a self-report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Frame index the rating was taken at
    pub source_frame_marker: i64,
    /// Continuous score used for classification (group consensus)
    pub severity_score: f64,
    /// The participant's own rating
    pub raw_rating: f64,
    /// When the rating was logged, if the log carries a time
    pub reported_at: Option<TimeOfDay>,
}

/// Element-wise consensus of several participants' rating sequences.
///
/// Sequences shorter than `min_len` (or than the longest sequence) count as
/// zero for the missing elicitations; the sum is divided by the number of
/// participants.
pub fn consensus_scores(ratings: &[Vec<f64>], min_len: usize) -> Vec<f64> {
    if ratings.is_empty() {
        return Vec::new();
    }

    let len = ratings.iter().map(Vec::len).max().unwrap_or(0).max(min_len);
    let mut totals = vec![0.0; len];
    for sequence in ratings {
        for (total, rating) in totals.iter_mut().zip(sequence) {
            *total += rating;
        }
    }

    let participants = ratings.len() as f64;
    totals.into_iter().map(|total| total / participants).collect()
}

/// Suggest band cut points from the quartiles of observed scores.
///
/// Fails with `InvalidBands` when two quartiles coincide, since such cut
/// points cannot classify anything into the band between them.
pub fn derive_bands(scores: &[f64]) -> Result<SeverityBands, AlignError> {
    let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if finite.is_empty() {
        return Err(AlignError::InvalidBands(
            "no scores to derive bands from".to_string(),
        ));
    }

    let mut data = Data::new(finite);
    let bands = SeverityBands {
        low: data.percentile(25),
        medium: data.percentile(50),
        high: data.percentile(75),
    };
    if !(bands.low < bands.medium && bands.medium < bands.high) {
        return Err(AlignError::InvalidBands(format!(
            "quartiles {} / {} / {} are not strictly increasing",
            bands.low, bands.medium, bands.high
        )));
    }
    Ok(bands)
}
