//! Per-event artifact files.
//!
//! Each aligned event produces one CSV per stream and one frame manifest.
//! References returned to the caller are paths relative to the output
//! root, e.g. `eye/eye-3f2a9c0d1b7e4a55.csv`.

use crate::core::aligner::ExtractedStream;
use crate::core::frames::FrameRecord;
use crate::core::severity::SeverityClass;
use crate::error::AlignError;
use std::path::PathBuf;

/// Writes artifact files below an output root.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
    precision: usize,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>, precision: usize) -> Self {
        Self {
            root: root.into(),
            precision,
        }
    }

    /// Write the rows of one stream. An empty stream still gets a file with
    /// its header.
    pub fn write_stream(
        &self,
        uid: &str,
        stream: &ExtractedStream,
        severity_score: f64,
        severity_class: Option<SeverityClass>,
    ) -> Result<String, AlignError> {
        let reference = format!("{0}/{0}-{uid}.csv", stream.name);
        let mut writer = self.create(&reference)?;

        let mut header = vec!["time", "severity_score", "severity_class"];
        header.extend(stream.fields.iter().map(String::as_str));
        writer.write_record(&header)?;

        let score = self.format(severity_score);
        let class = severity_class.map(|c| c.to_string()).unwrap_or_default();
        for row in &stream.rows {
            let mut cells = vec![row.time.to_string(), score.clone(), class.clone()];
            cells.extend(
                stream
                    .fields
                    .iter()
                    .map(|field| row.get(field).map(|v| self.format(v)).unwrap_or_default()),
            );
            writer.write_record(&cells)?;
        }

        writer.flush()?;
        Ok(reference)
    }

    /// Write the list of frames selected for one event.
    pub fn write_frame_manifest(
        &self,
        uid: &str,
        frames: &[FrameRecord],
    ) -> Result<String, AlignError> {
        let reference = format!("frames/frames-{uid}.csv");
        let mut writer = self.create(&reference)?;

        writer.write_record(["time", "frame_index", "file_name"])?;
        for frame in frames {
            writer.write_record([
                frame.second().to_string(),
                frame.index.to_string(),
                frame.file_name.clone(),
            ])?;
        }

        writer.flush()?;
        Ok(reference)
    }

    fn create(&self, reference: &str) -> Result<csv::Writer<std::fs::File>, AlignError> {
        let path = self.root.join(reference);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(csv::Writer::from_path(path)?)
    }

    fn format(&self, value: f64) -> String {
        format!("{value:.prec$}", prec = self.precision)
    }
}
