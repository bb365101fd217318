//! Sensor stream extraction.
//!
//! Every stream is reduced to at most one row per window second: rows
//! outside the window or before the session's first frame are dropped, rows
//! failing the stream's validity flag are dropped, and whatever remains
//! inside one second is averaged field by field. Physiological streams sampled faster than 1 Hz are bucketed to
//! whole seconds first.

use crate::core::time_index::{from_epoch, ClockZone, TimeOfDay};
use crate::core::windowing::TimeWindow;
use crate::error::AlignError;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// A single sensor row keyed by time of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecord {
    pub time: TimeOfDay,
    pub values: BTreeMap<String, f64>,
}

impl SensorRecord {
    pub fn new(time: TimeOfDay) -> Self {
        Self {
            time,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// Filters and aggregates one stream against a window.
#[derive(Debug, Clone, Default)]
pub struct StreamExtractor {
    fields: Vec<String>,
    validity_field: Option<String>,
}

impl StreamExtractor {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            validity_field: None,
        }
    }

    /// Drop rows whose `field` is missing, zero or NaN.
    pub fn with_validity(mut self, field: impl Into<String>) -> Self {
        self.validity_field = Some(field.into());
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Reduce `records` to one averaged row per window second.
    ///
    /// The output is ascending by time, never repeats a second, and only
    /// contains covered seconds of `window`. Seconds without a single finite
    /// field value produce no row. A second holding a single valid row is
    /// passed through unchanged.
    pub fn extract(&self, records: &[SensorRecord], window: &TimeWindow) -> Vec<SensorRecord> {
        let mut groups: BTreeMap<TimeOfDay, BTreeMap<&str, Vec<f64>>> = BTreeMap::new();

        for record in records {
            if !window.covers(record.time) || !self.is_valid(record) {
                continue;
            }

            for field in &self.fields {
                if let Some(value) = record.get(field).filter(|v| v.is_finite()) {
                    groups
                        .entry(record.time)
                        .or_default()
                        .entry(field.as_str())
                        .or_default()
                        .push(value);
                }
            }
        }

        groups
            .into_iter()
            .map(|(time, fields)| SensorRecord {
                time,
                values: fields
                    .into_iter()
                    .map(|(field, samples)| (field.to_string(), samples.iter().mean()))
                    .collect(),
            })
            .collect()
    }

    fn is_valid(&self, record: &SensorRecord) -> bool {
        match &self.validity_field {
            Some(field) => record
                .get(field)
                .map_or(false, |flag| !flag.is_nan() && flag != 0.0),
            None => true,
        }
    }
}

/// Bucket a raw physiological signal into 1 Hz records.
///
/// `start_epoch` is the absolute time of the first sample and `rate_hz` the
/// nominal sample rate. Consecutive groups of `round(rate_hz)` samples are
/// averaged into one record per second; a trailing partial group is averaged
/// over the samples it holds. Non-finite samples keep their slot but are left
/// out of the mean, and a group without any finite sample yields no record.
/// Signals slower than 1 Hz keep one record per sample, spaced `1 / rate_hz`
/// seconds apart.
pub fn resample_physiological(
    start_epoch: f64,
    rate_hz: f64,
    samples: &[f64],
    field: &str,
    zone: &ClockZone,
) -> Result<Vec<SensorRecord>, AlignError> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(AlignError::malformed(
            rate_hz.to_string(),
            "positive sample rate in Hz",
        ));
    }

    let (bucket, step_secs) = if rate_hz >= 1.0 {
        (rate_hz.round() as usize, 1.0)
    } else {
        (1, 1.0 / rate_hz)
    };

    samples
        .chunks(bucket)
        .enumerate()
        .filter_map(|(i, chunk)| {
            let finite: Vec<f64> = chunk.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                return None;
            }
            let mean = finite.iter().mean();
            Some(
                from_epoch(start_epoch + i as f64 * step_secs, zone)
                    .map(|time| SensorRecord::new(time).with(field, mean)),
            )
        })
        .collect()
}
