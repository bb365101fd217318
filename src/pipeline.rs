//! Dataset-level operations behind the CLI commands.
//!
//! Every operation walks `<data_root>/<simulation>/<individual>/`. Failures
//! local to one session are logged and the walk continues; only failures
//! that make the whole run meaningless (unreadable data root, unwritable
//! output) are returned.

use crate::config::Config;
use crate::core::aligner::EventAligner;
use crate::core::self_report::{consensus_scores, derive_bands};
use crate::core::severity::{SeverityBands, SeverityClassifier};
use crate::error::AlignError;
use crate::report::{RunStats, STATS_FILE};
use crate::store::{
    discover_sessions, load_session, readers, sessions_by_simulation, write_consensus_log,
    DatasetWriter,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Align every session under `config.data_root`.
///
/// Sessions run one after another. Clearing `running` stops the run after
/// the current session; the metadata table on disk stays complete for every
/// committed event either way.
pub fn run_alignment(
    config: &Config,
    stats: &RunStats,
    running: &AtomicBool,
) -> Result<(), AlignError> {
    let aligner = EventAligner::from_config(config)?;
    let sessions = discover_sessions(&config.data_root)?;
    info!(
        sessions = sessions.len(),
        data_root = %config.data_root.display(),
        "Starting alignment"
    );

    let mut writer = DatasetWriter::from_config(config);
    writer.table().persist()?;

    for dir in &sessions {
        if !running.load(Ordering::SeqCst) {
            warn!("Interrupted; stopping before {}/{}", dir.simulation, dir.individual);
            break;
        }

        let session = match load_session(dir, config) {
            Ok(session) => session,
            Err(e) => {
                error!(
                    simulation = %dir.simulation,
                    individual = %dir.individual,
                    "Skipping session: {e}"
                );
                stats.record_session_failed();
                continue;
            }
        };

        let summary = aligner.process_session(&session, &mut writer);
        stats.record_session(&summary);
        info!(
            simulation = %dir.simulation,
            individual = %dir.individual,
            events = summary.events,
            aligned = summary.aligned,
            skipped = summary.skipped,
            "Session aligned"
        );
    }

    stats.save(&config.output_root.join(STATS_FILE))?;
    Ok(())
}

/// Write the consensus log of every individual.
///
/// For each simulation the raw ratings of all its individuals are combined
/// with [`consensus_scores`]; a simulation with an unreadable log is skipped
/// entirely since its divisor would be wrong. A log that cannot be written is
/// logged and skipped. Returns the number of logs written.
pub fn run_consensus(config: &Config) -> Result<usize, AlignError> {
    let sessions = discover_sessions(&config.data_root)?;
    let source = &config.events;
    let mut written = 0;

    for (simulation, individuals) in sessions_by_simulation(&sessions) {
        let ratings: Result<Vec<Vec<f64>>, AlignError> = individuals
            .iter()
            .map(|dir| readers::read_raw_ratings(&dir.path.join(&source.raw_file_name), source))
            .collect();
        let ratings = match ratings {
            Ok(ratings) => ratings,
            Err(e) => {
                error!(simulation, "Skipping simulation: {e}");
                continue;
            }
        };

        let consensus = consensus_scores(&ratings, source.elicitations);
        debug!(simulation, individuals = individuals.len(), ?consensus, "Consensus computed");

        for dir in individuals {
            match write_consensus_log(
                &dir.path.join(&source.raw_file_name),
                &dir.path.join(&source.file_name),
                &consensus,
                source,
            ) {
                Ok(rows) => {
                    info!(simulation, individual = %dir.individual, rows, "Consensus log written");
                    written += 1;
                }
                Err(e) => error!(
                    simulation,
                    individual = %dir.individual,
                    "Skipping consensus log: {e}"
                ),
            }
        }
    }

    Ok(written)
}

/// Suggest band cut points from every consensus score in the dataset.
///
/// The result is checked against the configured score range, so it can be
/// stored in the configuration as is.
pub fn run_bands(config: &Config) -> Result<SeverityBands, AlignError> {
    let sessions = discover_sessions(&config.data_root)?;
    let mut scores = Vec::new();

    for dir in &sessions {
        let path = dir.path.join(&config.events.file_name);
        match readers::read_events(&path, &config.events) {
            Ok(events) => scores.extend(events.iter().map(|e| e.severity_score)),
            Err(e) => warn!(
                simulation = %dir.simulation,
                individual = %dir.individual,
                "Ignoring self-report log: {e}"
            ),
        }
    }

    info!(scores = scores.len(), "Deriving bands");
    let bands = derive_bands(&scores)?;
    SeverityClassifier::new(bands, config.severity.min_score, config.severity.max_score)?;
    Ok(bands)
}
