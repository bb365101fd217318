//! Configuration for an alignment run.

use crate::core::frames::FrameNaming;
use crate::core::severity::{OutOfRangePolicy, SeverityBands};
use crate::core::time_index::{ClockZone, TimeFormat, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the aligner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the raw dataset (`<root>/<simulation>/<individual>/`)
    pub data_root: PathBuf,

    /// Where artifacts and the metadata table are written
    pub output_root: PathBuf,

    /// Window around each event
    pub window: WindowConfig,

    /// Severity banding
    pub severity: SeverityConfig,

    /// Self-report log layout
    pub events: EventSource,

    /// Frame listing layout
    pub frames: FrameNaming,

    /// Sensor streams to extract for every event
    pub streams: Vec<StreamConfig>,

    /// Worker threads per session (1 processes events sequentially)
    pub workers: usize,

    /// Decimal places for numeric artifact cells
    pub precision: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/raw"),
            output_root: PathBuf::from("data/processed"),
            window: WindowConfig::default(),
            severity: SeverityConfig::default(),
            events: EventSource::default(),
            frames: FrameNaming::default(),
            streams: default_streams(),
            workers: 1,
            precision: 3,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sickness-align")
            .join("config.json")
    }

    /// Check the parts serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        let span = u64::from(self.window.lookback_secs) + u64::from(self.window.lookahead_secs);
        if span >= u64::from(SECONDS_PER_DAY) {
            return Err(ConfigError::Invalid(format!(
                "window of {} seconds does not fit in one day",
                span + 1
            )));
        }
        let mut names: Vec<&str> = self.streams.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::Invalid("stream names must be unique".to_string()));
        }
        if let Some(stream) = self.streams.iter().find(|s| s.fields.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "stream '{}' has no fields",
                stream.name
            )));
        }
        Ok(())
    }
}

/// Seconds before and after each event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    pub lookback_secs: u32,
    pub lookahead_secs: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_secs: 30,
            lookahead_secs: 1,
        }
    }
}

/// Severity band boundaries and admissible score range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityConfig {
    pub bands: SeverityBands,
    pub min_score: f64,
    pub max_score: f64,
    pub out_of_range: OutOfRangePolicy,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            bands: SeverityBands::default(),
            min_score: 0.0,
            max_score: 10.0,
            out_of_range: OutOfRangePolicy::default(),
        }
    }
}

/// Column layout of the self-report log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    /// Log consumed by `align` (carries the consensus column)
    pub file_name: String,
    /// Raw per-participant log consumed by `consensus`
    pub raw_file_name: String,
    pub time_column: String,
    pub time_format: TimeFormat,
    pub frame_column: String,
    pub raw_rating_column: String,
    pub score_column: String,
    /// Minimum number of elicitations per simulation
    pub elicitations: usize,
}

impl Default for EventSource {
    fn default() -> Self {
        Self {
            file_name: "verbal_global.csv".to_string(),
            raw_file_name: "verbal_feedback.csv".to_string(),
            time_column: "Time".to_string(),
            time_format: TimeFormat::DateTime("%Y.%m.%d %H:%M:%S:%f".to_string()),
            frame_column: "Frame".to_string(),
            raw_rating_column: "CS".to_string(),
            score_column: "CSG".to_string(),
            elicitations: 13,
        }
    }
}

/// One sensor stream of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Short name used for artifact directories and metadata columns
    pub name: String,
    /// File inside the session directory
    pub file_name: String,
    /// Numeric fields to aggregate and export
    pub fields: Vec<String>,
    /// Rows are dropped when this field is missing or zero
    #[serde(default)]
    pub validity_field: Option<String>,
    pub layout: StreamLayout,
}

/// How a stream file is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamLayout {
    /// Header row, one timestamp column, one column per field
    Tabular {
        time_column: String,
        time_format: TimeFormat,
    },
    /// Start epoch, sample rate, then one value per row
    Physiological { zone: ClockZone },
}

fn default_streams() -> Vec<StreamConfig> {
    let tracker = |name: &str, file_name: &str, fields: &[&str]| StreamConfig {
        name: name.to_string(),
        file_name: file_name.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
        validity_field: None,
        layout: StreamLayout::Tabular {
            time_column: "Time".to_string(),
            time_format: TimeFormat::TimeOfDay("%H-%M-%S-%f".to_string()),
        },
    };
    let physio = |name: &str, file_name: &str| StreamConfig {
        name: name.to_string(),
        file_name: file_name.to_string(),
        fields: vec![name.to_string()],
        validity_field: None,
        layout: StreamLayout::Physiological {
            zone: ClockZone::default(),
        },
    };

    vec![
        tracker(
            "eye",
            "eye_tracking.csv",
            &[
                "Convergence_distance",
                "LeftPupilDiameter",
                "RightPupilDiameter",
                "NrmSRLeftEyeGazeDirX",
                "NrmSRLeftEyeGazeDirY",
                "NrmSRLeftEyeGazeDirZ",
                "NrmSRRightEyeGazeDirX",
                "NrmSRRightEyeGazeDirY",
                "NrmSRRightEyeGazeDirZ",
            ],
        ),
        tracker(
            "head",
            "head_tracking.csv",
            &[
                "HeadQRotationX",
                "HeadQRotationY",
                "HeadQRotationZ",
                "HeadQRotationW",
            ],
        ),
        physio("hr", "HR.csv"),
        physio("eda", "EDA.csv"),
    ]
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.lookback_secs, 30);
        assert_eq!(config.window.lookahead_secs, 1);
        assert_eq!(config.severity.bands.low, 0.66);
        assert_eq!(config.workers, 1);
        assert_eq!(config.streams.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_must_fit_in_a_day() {
        let mut config = Config::default();
        config.window.lookback_secs = u32::MAX;
        config.window.lookahead_secs = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.window.lookback_secs = 86_399;
        config.window.lookahead_secs = 0;
        assert!(config.validate().is_ok());

        config.window.lookahead_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.window.lookback_secs = 5;
        config.severity.out_of_range = OutOfRangePolicy::Unclassified;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.window.lookback_secs, 5);
        assert_eq!(loaded.severity.out_of_range, OutOfRangePolicy::Unclassified);
        assert_eq!(loaded.streams[2].name, "hr");
        assert!(matches!(
            loaded.streams[3].layout,
            StreamLayout::Physiological { .. }
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let duplicate = config.streams[0].clone();
        config.streams.push(duplicate);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.streams[1].fields.clear();
        assert!(config.validate().is_err());
    }
}
