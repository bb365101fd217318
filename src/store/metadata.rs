//! The run's metadata table.

use crate::core::aligner::AlignedSample;
use crate::error::AlignError;
use std::path::PathBuf;

/// Append-only table with one row per aligned event.
///
/// The table is rewritten after every append so that an interrupted run
/// leaves a complete file covering everything committed so far. Rows are
/// only added to memory once the file holding them has been written.
#[derive(Debug)]
pub struct MetadataTable {
    path: PathBuf,
    stream_names: Vec<String>,
    rows: Vec<AlignedSample>,
}

impl MetadataTable {
    /// Create an empty table persisted at `path`, with one artifact column
    /// per stream.
    pub fn new(path: impl Into<PathBuf>, stream_names: Vec<String>) -> Self {
        Self {
            path: path.into(),
            stream_names,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row and persist the table.
    pub fn append(&mut self, sample: AlignedSample) -> Result<(), AlignError> {
        self.write(Some(&sample))?;
        self.rows.push(sample);
        Ok(())
    }

    /// Write the table as it currently stands.
    pub fn persist(&self) -> Result<(), AlignError> {
        self.write(None)
    }

    fn write(&self, pending: Option<&AlignedSample>) -> Result<(), AlignError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&staging)?;
            writer.write_record(self.header())?;
            for sample in self.rows.iter().chain(pending) {
                writer.write_record(self.row(sample))?;
            }
            writer.flush()?;
        }
        std::fs::rename(&staging, &self.path)?;

        Ok(())
    }

    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = ["uid", "individual", "simulation", "event", "frames"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend(self.stream_names.iter().cloned());
        header.extend(
            ["cs_severity_class", "severity_score", "fms"]
                .iter()
                .map(|s| s.to_string()),
        );
        header
    }

    fn row(&self, sample: &AlignedSample) -> Vec<String> {
        let mut row = vec![
            sample.uid.clone(),
            sample.participant_id.clone(),
            sample.session_id.clone(),
            sample.event_index.to_string(),
            sample.frames_ref.clone(),
        ];
        row.extend(
            self.stream_names
                .iter()
                .map(|name| sample.artifacts.get(name).cloned().unwrap_or_default()),
        );
        row.push(
            sample
                .severity_class
                .map(|c| c.to_string())
                .unwrap_or_default(),
        );
        row.push(sample.severity_score.to_string());
        row.push(sample.fms_score.to_string());
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::severity::SeverityClass;
    use std::collections::BTreeMap;

    fn sample(uid: &str, class: Option<SeverityClass>) -> AlignedSample {
        let mut artifacts = BTreeMap::new();
        artifacts.insert("eye".to_string(), format!("eye/eye-{uid}.csv"));
        AlignedSample {
            uid: uid.to_string(),
            participant_id: "p01".to_string(),
            session_id: "sim-a".to_string(),
            event_index: 0,
            severity_class: class,
            severity_score: 1.5,
            fms_score: 2.0,
            frames_ref: format!("frames/frames-{uid}.csv"),
            artifacts,
        }
    }

    #[test]
    fn test_table_persisted_after_each_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta_data.csv");
        let mut table = MetadataTable::new(&path, vec!["eye".to_string(), "hr".to_string()]);

        table.append(sample("a1", Some(SeverityClass::Moderate))).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(
            content.lines().next().unwrap(),
            "uid,individual,simulation,event,frames,eye,hr,cs_severity_class,severity_score,fms"
        );
        assert_eq!(
            content.lines().nth(1).unwrap(),
            "a1,p01,sim-a,0,frames/frames-a1.csv,eye/eye-a1.csv,,2,1.5,2"
        );

        table.append(sample("b2", None)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().nth(2).unwrap().contains(",,1.5,2"));
        assert_eq!(table.len(), 2);
        assert!(!dir.path().join("meta_data.csv.tmp").exists());
    }

    #[test]
    fn test_persist_empty_table_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("meta_data.csv");
        let table = MetadataTable::new(&path, vec![]);

        table.persist().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "uid,individual,simulation,event,frames,cs_severity_class,severity_score,fms\n"
        );
        assert!(table.is_empty());
    }
}
