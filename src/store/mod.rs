//! Reading session inputs and writing the aligned dataset.

pub mod artifacts;
pub mod dataset;
pub mod metadata;
pub mod readers;

pub use artifacts::ArtifactWriter;
pub use dataset::{
    discover_sessions, load_session, sessions_by_simulation, write_consensus_log, DatasetWriter,
    SessionDir, METADATA_FILE,
};
pub use metadata::MetadataTable;
