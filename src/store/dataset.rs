//! Dataset layout: session discovery, session loading and the sink that
//! turns aligned events into files.
//!
//! ```text
//! <data_root>/<simulation>/<individual>/
//!     Frames/Frame-<index>-<HH>-<MM>-<SS>-<frac>.png
//!     verbal_global.csv
//!     eye_tracking.csv, head_tracking.csv
//!     HR.csv, EDA.csv
//! ```

use crate::config::{Config, EventSource, StreamConfig, StreamLayout};
use crate::core::aligner::{AlignedEvent, AlignedSample, SampleSink, SessionData, StreamData};
use crate::core::streams::{SensorRecord, StreamExtractor};
use crate::error::AlignError;
use crate::store::artifacts::ArtifactWriter;
use crate::store::metadata::MetadataTable;
use crate::store::readers;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the run's metadata table.
pub const METADATA_FILE: &str = "meta_data.csv";

/// One participant directory inside one simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    pub simulation: String,
    pub individual: String,
    pub path: PathBuf,
}

/// Find every `<simulation>/<individual>` directory, sorted by name.
pub fn discover_sessions(root: &Path) -> Result<Vec<SessionDir>, AlignError> {
    let mut sessions = Vec::new();

    for simulation in sorted_subdirs(root)? {
        for individual in sorted_subdirs(&simulation)? {
            sessions.push(SessionDir {
                simulation: dir_name(&simulation),
                individual: dir_name(&individual),
                path: individual,
            });
        }
    }

    Ok(sessions)
}

/// Group discovered sessions by simulation.
pub fn sessions_by_simulation(sessions: &[SessionDir]) -> BTreeMap<&str, Vec<&SessionDir>> {
    let mut grouped: BTreeMap<&str, Vec<&SessionDir>> = BTreeMap::new();
    for session in sessions {
        grouped
            .entry(session.simulation.as_str())
            .or_default()
            .push(session);
    }
    grouped
}

/// Read every input of one session.
pub fn load_session(dir: &SessionDir, config: &Config) -> Result<SessionData, AlignError> {
    let frames = readers::list_frames(&dir.path.join(&config.frames.directory), &config.frames)?;
    let events = readers::read_events(&dir.path.join(&config.events.file_name), &config.events)?;

    let streams = config
        .streams
        .iter()
        .map(|stream| {
            let records = load_stream(&dir.path, stream)?;
            debug!(stream = %stream.name, records = records.len(), "Stream loaded");

            let mut extractor = StreamExtractor::new(stream.fields.clone());
            if let Some(flag) = &stream.validity_field {
                extractor = extractor.with_validity(flag.clone());
            }
            Ok(StreamData {
                name: stream.name.clone(),
                extractor,
                records,
            })
        })
        .collect::<Result<Vec<_>, AlignError>>()?;

    Ok(SessionData {
        participant_id: dir.individual.clone(),
        session_id: dir.simulation.clone(),
        frames,
        events,
        streams,
    })
}

fn load_stream(session_path: &Path, stream: &StreamConfig) -> Result<Vec<SensorRecord>, AlignError> {
    let path = session_path.join(&stream.file_name);
    match &stream.layout {
        StreamLayout::Tabular {
            time_column,
            time_format,
        } => readers::read_tabular_stream(
            &path,
            time_column,
            time_format,
            &stream.fields,
            stream.validity_field.as_deref(),
        ),
        StreamLayout::Physiological { zone } => {
            readers::read_physiological_stream(&path, &stream.fields[0], zone)
        }
    }
}

/// Sink writing artifacts and the metadata table of a run.
#[derive(Debug)]
pub struct DatasetWriter {
    artifacts: ArtifactWriter,
    table: MetadataTable,
}

impl DatasetWriter {
    pub fn new(artifacts: ArtifactWriter, table: MetadataTable) -> Self {
        Self { artifacts, table }
    }

    /// Writer for `config.output_root` with one metadata column per stream.
    pub fn from_config(config: &Config) -> Self {
        let stream_names = config.streams.iter().map(|s| s.name.clone()).collect();
        Self::new(
            ArtifactWriter::new(&config.output_root, config.precision),
            MetadataTable::new(config.output_root.join(METADATA_FILE), stream_names),
        )
    }

    pub fn table(&self) -> &MetadataTable {
        &self.table
    }
}

impl SampleSink for DatasetWriter {
    fn commit(
        &mut self,
        session: &SessionData,
        aligned: AlignedEvent,
    ) -> Result<AlignedSample, AlignError> {
        let frames_ref = self
            .artifacts
            .write_frame_manifest(&aligned.uid, &aligned.window.matched_frames)?;

        let mut artifacts = BTreeMap::new();
        for stream in &aligned.streams {
            let reference = self.artifacts.write_stream(
                &aligned.uid,
                stream,
                aligned.event.severity_score,
                aligned.severity_class,
            )?;
            artifacts.insert(stream.name.clone(), reference);
        }

        let sample = AlignedSample {
            uid: aligned.uid,
            participant_id: session.participant_id.clone(),
            session_id: session.session_id.clone(),
            event_index: aligned.index,
            severity_class: aligned.severity_class,
            severity_score: aligned.event.severity_score,
            fms_score: aligned.event.raw_rating,
            frames_ref,
            artifacts,
        };
        self.table.append(sample.clone())?;

        Ok(sample)
    }
}

/// Copy a raw self-report log to `output`, appending the consensus column.
///
/// Rows without a readable raw rating are dropped; the remaining rows take
/// the consensus value at their position. An existing consensus column is
/// replaced. Returns the number of rows written.
pub fn write_consensus_log(
    raw: &Path,
    output: &Path,
    consensus: &[f64],
    source: &EventSource,
) -> Result<usize, AlignError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(raw)?;
    let headers = reader.headers()?.clone();
    let raw_idx = readers::column_index(&headers, &source.raw_rating_column, raw)?;
    let stale_idx = headers.iter().position(|h| h == source.score_column);

    let keep = |idx: usize| Some(idx) != stale_idx;
    let mut writer = csv::Writer::from_path(output)?;
    let mut header: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| keep(*idx))
        .map(|(_, h)| h)
        .collect();
    header.push(&source.score_column);
    writer.write_record(&header)?;

    let mut position = 0;
    for record in reader.records() {
        let record = record?;
        if readers::number(&record, raw_idx).is_none() {
            continue;
        }
        let Some(score) = consensus.get(position) else {
            break;
        };

        let mut row: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(idx, _)| keep(*idx))
            .map(|(_, cell)| cell.to_string())
            .collect();
        row.push(score.to_string());
        writer.write_record(&row)?;
        position += 1;
    }

    writer.flush()?;
    Ok(position)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, AlignError> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
