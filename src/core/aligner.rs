//! Per-session event alignment.
//!
//! For every self-report event of a session the aligner resolves the frame,
//! builds the window, extracts every stream and classifies the score. Events
//! are independent of each other, so with more than one worker they are
//! fanned out to scoped threads over the (read-only) session data. Results
//! funnel back to a single [`SampleSink`] on the calling thread, which
//! commits them in event order.

use crate::config::Config;
use crate::core::frames::{self, FrameRecord};
use crate::core::self_report::Event;
use crate::core::severity::{OutOfRangePolicy, SeverityClass, SeverityClassifier};
use crate::core::streams::{SensorRecord, StreamExtractor};
use crate::core::windowing::{TimeWindow, WindowBuilder};
use crate::error::AlignError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::thread;
use tracing::{debug, warn};
use uuid::Uuid;

/// One loaded stream of a session.
#[derive(Debug, Clone)]
pub struct StreamData {
    pub name: String,
    pub extractor: StreamExtractor,
    pub records: Vec<SensorRecord>,
}

/// Everything the aligner reads for one participant in one simulation.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub participant_id: String,
    pub session_id: String,
    pub frames: Vec<FrameRecord>,
    pub events: Vec<Event>,
    pub streams: Vec<StreamData>,
}

/// Rows of one stream inside one event window.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedStream {
    pub name: String,
    pub fields: Vec<String>,
    pub rows: Vec<SensorRecord>,
}

/// The aligned, not yet persisted, result for one event.
#[derive(Debug, Clone, Serialize)]
pub struct AlignedEvent {
    /// Position of the event in the session's log
    pub index: usize,
    pub uid: String,
    pub event: Event,
    pub window: TimeWindow,
    /// `None` when the score was out of range under the `Unclassified` policy
    pub severity_class: Option<SeverityClass>,
    pub streams: Vec<ExtractedStream>,
}

/// One metadata row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSample {
    pub uid: String,
    pub participant_id: String,
    pub session_id: String,
    pub event_index: usize,
    pub severity_class: Option<SeverityClass>,
    pub severity_score: f64,
    pub fms_score: f64,
    /// Reference to the frame manifest artifact
    pub frames_ref: String,
    /// Stream name -> artifact reference
    pub artifacts: BTreeMap<String, String>,
}

impl AlignedSample {
    /// Number of artifacts this row references.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len() + usize::from(!self.frames_ref.is_empty())
    }
}

/// Persists aligned events. Only ever called from one thread at a time.
pub trait SampleSink {
    fn commit(
        &mut self,
        session: &SessionData,
        aligned: AlignedEvent,
    ) -> Result<AlignedSample, AlignError>;
}

/// Counts for one processed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub events: usize,
    pub aligned: usize,
    pub skipped: usize,
    pub artifacts: usize,
}

/// Aligns the events of a session.
#[derive(Debug, Clone)]
pub struct EventAligner {
    window: WindowBuilder,
    classifier: SeverityClassifier,
    policy: OutOfRangePolicy,
    workers: usize,
}

impl EventAligner {
    pub fn new(
        window: WindowBuilder,
        classifier: SeverityClassifier,
        policy: OutOfRangePolicy,
        workers: usize,
    ) -> Self {
        Self {
            window,
            classifier,
            policy,
            workers: workers.max(1),
        }
    }

    /// Build an aligner from the run configuration.
    pub fn from_config(config: &Config) -> Result<Self, AlignError> {
        let severity = &config.severity;
        let classifier =
            SeverityClassifier::new(severity.bands, severity.min_score, severity.max_score)?;
        Ok(Self::new(
            WindowBuilder::new(config.window.lookback_secs, config.window.lookahead_secs),
            classifier,
            severity.out_of_range,
            config.workers,
        ))
    }

    /// Align a single event. Pure computation; nothing is written.
    pub fn align_event(
        &self,
        session: &SessionData,
        index: usize,
        event: &Event,
    ) -> Result<AlignedEvent, AlignError> {
        let frame = frames::resolve(&session.frames, event.source_frame_marker)?;
        let window = self.window.build(&session.frames, frame)?;

        if window.leading_uncovered > 0 {
            debug!(
                event = index,
                uncovered = window.leading_uncovered,
                "Window starts before the first recorded frame"
            );
        }

        let streams = session
            .streams
            .iter()
            .map(|stream| {
                let rows = stream.extractor.extract(&stream.records, &window);
                if rows.is_empty() {
                    let empty = AlignError::EmptyWindowResult {
                        stream: stream.name.clone(),
                        center: window.center.to_string(),
                    };
                    warn!(
                        participant = %session.participant_id,
                        session = %session.session_id,
                        event = index,
                        "{empty}"
                    );
                }
                ExtractedStream {
                    name: stream.name.clone(),
                    fields: stream.extractor.fields().to_vec(),
                    rows,
                }
            })
            .collect();

        let severity_class = self
            .classifier
            .classify_with(event.severity_score, self.policy)?;
        if severity_class.is_none() {
            warn!(
                participant = %session.participant_id,
                session = %session.session_id,
                event = index,
                score = event.severity_score,
                "Score outside admissible range; keeping event unclassified"
            );
        }

        Ok(AlignedEvent {
            index,
            uid: mint_uid(),
            event: event.clone(),
            window,
            severity_class,
            streams,
        })
    }

    /// Align every event of `session` and hand the results to `sink`.
    ///
    /// A failing event is logged and skipped; the rest of the session
    /// continues. Results reach the sink in event order regardless of the
    /// number of workers.
    pub fn process_session(
        &self,
        session: &SessionData,
        sink: &mut dyn SampleSink,
    ) -> SessionSummary {
        let total = session.events.len();
        let mut summary = SessionSummary {
            events: total,
            ..SessionSummary::default()
        };

        if self.workers <= 1 || total <= 1 {
            for (index, event) in session.events.iter().enumerate() {
                let result = self.align_event(session, index, event);
                self.finish(session, index, result, sink, &mut summary);
            }
            return summary;
        }

        thread::scope(|scope| {
            let (job_tx, job_rx) = crossbeam_channel::unbounded::<usize>();
            let (result_tx, result_rx) = crossbeam_channel::bounded(self.workers * 2);

            for index in 0..total {
                // Unbounded and the receiver is still alive.
                let _ = job_tx.send(index);
            }
            drop(job_tx);

            for _ in 0..self.workers.min(total) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for index in job_rx.iter() {
                        let result = self.align_event(session, index, &session.events[index]);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (index, result) in result_rx.iter() {
                pending.insert(index, result);
                while let Some(result) = pending.remove(&next) {
                    self.finish(session, next, result, sink, &mut summary);
                    next += 1;
                }
            }
        });

        summary
    }

    fn finish(
        &self,
        session: &SessionData,
        index: usize,
        result: Result<AlignedEvent, AlignError>,
        sink: &mut dyn SampleSink,
        summary: &mut SessionSummary,
    ) {
        match result.and_then(|aligned| sink.commit(session, aligned)) {
            Ok(sample) => {
                summary.aligned += 1;
                summary.artifacts += sample.artifact_count();
                debug!(
                    participant = %session.participant_id,
                    session = %session.session_id,
                    event = index,
                    uid = %sample.uid,
                    "Event aligned"
                );
            }
            Err(e) => {
                summary.skipped += 1;
                warn!(
                    participant = %session.participant_id,
                    session = %session.session_id,
                    event = index,
                    marker = session.events[index].source_frame_marker,
                    reason = %e,
                    "Skipping event"
                );
            }
        }
    }
}

/// Short unique identifier for one aligned sample.
pub fn mint_uid() -> String {
    let mut uid = Uuid::new_v4().simple().to_string();
    uid.truncate(16);
    uid
}
