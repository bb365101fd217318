//! Readers for the raw session files.

use crate::config::EventSource;
use crate::core::frames::{FrameNaming, FrameRecord};
use crate::core::self_report::Event;
use crate::core::streams::{resample_physiological, SensorRecord};
use crate::core::time_index::{normalize, ClockZone, RawTimestamp, TimeFormat};
use crate::error::AlignError;
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::{debug, warn};

/// List the frames of a session directory.
///
/// Files without the frame prefix are ignored; prefixed files whose name
/// does not parse are logged and ignored. The result is in directory
/// enumeration order.
pub fn list_frames(dir: &Path, naming: &FrameNaming) -> Result<Vec<FrameRecord>, AlignError> {
    let mut frames = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match naming.parse(&name) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => debug!(file = %name, "Ignoring non-frame file"),
            Err(e) => warn!(file = %name, "Ignoring frame with unreadable name: {e}"),
        }
    }

    Ok(frames)
}

/// Read the self-report log consumed by alignment.
///
/// Rows without a consensus score are dropped. A time column, when
/// present, must match the declared format.
pub fn read_events(path: &Path, source: &EventSource) -> Result<Vec<Event>, AlignError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let frame_idx = column_index(&headers, &source.frame_column, path)?;
    let raw_idx = column_index(&headers, &source.raw_rating_column, path)?;
    let score_idx = column_index(&headers, &source.score_column, path)?;
    let time_idx = headers.iter().position(|h| h == source.time_column);

    let mut events = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;

        let Some(severity_score) = number(&record, score_idx) else {
            debug!(file = %path.display(), row, "Dropping event without consensus score");
            continue;
        };
        let Some(marker) = number(&record, frame_idx) else {
            warn!(file = %path.display(), row, "Dropping event without frame marker");
            continue;
        };

        let reported_at = match time_idx.and_then(|i| record.get(i)) {
            Some(text) if !text.is_empty() => {
                Some(normalize(RawTimestamp::Text(text), &source.time_format)?)
            }
            _ => None,
        };

        events.push(Event {
            source_frame_marker: marker.trunc() as i64,
            severity_score,
            raw_rating: number(&record, raw_idx).unwrap_or(f64::NAN),
            reported_at,
        });
    }

    Ok(events)
}

/// Read the raw rating column of a per-participant log.
pub fn read_raw_ratings(path: &Path, source: &EventSource) -> Result<Vec<f64>, AlignError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    let raw_idx = column_index(&headers, &source.raw_rating_column, path)?;

    let mut ratings = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(rating) = number(&record, raw_idx) {
            ratings.push(rating);
        }
    }
    Ok(ratings)
}

/// Read a tracker table keyed by a timestamp column.
pub fn read_tabular_stream(
    path: &Path,
    time_column: &str,
    time_format: &TimeFormat,
    fields: &[String],
    validity_field: Option<&str>,
) -> Result<Vec<SensorRecord>, AlignError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let time_idx = column_index(&headers, time_column, path)?;
    let mut columns = Vec::with_capacity(fields.len() + 1);
    for field in fields.iter().map(String::as_str).chain(validity_field) {
        columns.push((field, column_index(&headers, field, path)?));
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let raw_time = record.get(time_idx).unwrap_or_default();
        let time = normalize(RawTimestamp::Text(raw_time), time_format)?;

        let mut row = SensorRecord::new(time);
        for (field, idx) in &columns {
            if let Some(value) = number(&record, *idx) {
                row.values.insert((*field).to_string(), value);
            }
        }
        records.push(row);
    }

    Ok(records)
}

/// Read a wristband export and bucket it to 1 Hz.
///
/// The file has no header: the first row holds the start time in epoch
/// seconds, the second the sample rate in Hz, and every following row one
/// sample in its first column.
pub fn read_physiological_stream(
    path: &Path,
    field: &str,
    zone: &ClockZone,
) -> Result<Vec<SensorRecord>, AlignError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut rows = reader.records();

    let mut header_value = |what: &str| -> Result<f64, AlignError> {
        let record = rows
            .next()
            .transpose()?
            .ok_or_else(|| AlignError::malformed(path.display().to_string(), what))?;
        let cell = record.get(0).unwrap_or_default();
        cell.parse::<f64>()
            .map_err(|_| AlignError::malformed(cell, what))
    };
    let start_epoch = header_value("start time in epoch seconds")?;
    let rate_hz = header_value("sample rate in Hz")?;

    let mut samples = Vec::new();
    for record in rows {
        let record = record?;
        // Unreadable samples keep their slot so later samples stay on time.
        samples.push(number(&record, 0).unwrap_or(f64::NAN));
    }

    resample_physiological(start_epoch, rate_hz, &samples, field, zone)
}

pub(crate) fn column_index(
    headers: &StringRecord,
    column: &str,
    path: &Path,
) -> Result<usize, AlignError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| AlignError::MissingColumn {
            column: column.to_string(),
            file: path.display().to_string(),
        })
}

/// Parse a numeric cell. Boolean flags read as 1 / 0.
pub(crate) fn number(record: &StringRecord, idx: usize) -> Option<f64> {
    let cell = record.get(idx)?.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(value) = cell.parse::<f64>() {
        return Some(value);
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(1.0),
        "false" => Some(0.0),
        _ => None,
    }
}
