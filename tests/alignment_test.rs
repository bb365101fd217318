//! End-to-end tests over a small on-disk dataset

use sickness_align::config::{Config, StreamConfig, StreamLayout, WindowConfig};
use sickness_align::core::{ClockZone, OutOfRangePolicy, TimeFormat};
use sickness_align::error::AlignError;
use sickness_align::pipeline;
use sickness_align::report::{RunStats, RunStatsSnapshot, STATS_FILE};
use sickness_align::store::METADATA_FILE;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// 10:00:00 UTC on 2021-05-03.
const SESSION_START_EPOCH: i64 = 1_620_036_000;

fn write_session(root: &Path, simulation: &str, individual: &str) -> PathBuf {
    let dir = root.join(simulation).join(individual);
    fs::create_dir_all(dir.join("Frames")).unwrap();

    for i in 0..60u32 {
        let name = format!("Frame-{}-10-00-{:02}-000.png", i + 1, i);
        fs::write(dir.join("Frames").join(name), b"").unwrap();
    }

    fs::write(
        dir.join("verbal_global.csv"),
        "Time,Frame,CS,CSG\n\
         2021.05.03 10:00:30:000000,31,3,1.5\n\
         2021.05.03 10:00:35:000000,999,1,0.5\n\
         2021.05.03 10:00:40:000000,41,1,0.5\n",
    )
    .unwrap();

    let mut eye = String::from("Time,LeftPupilDiameter,Valid\n");
    for i in 0..60u32 {
        eye.push_str(&format!("10-00-{i:02}-000,3.0,True\n"));
        eye.push_str(&format!("10-00-{i:02}-500,5.0,True\n"));
        eye.push_str(&format!("10-00-{i:02}-900,100.0,False\n"));
    }
    fs::write(dir.join("eye_tracking.csv"), eye).unwrap();

    let mut hr = format!("{SESSION_START_EPOCH}.000000\n1.000000\n");
    for i in 0..60u32 {
        hr.push_str(&format!("{}\n", 60 + i));
    }
    fs::write(dir.join("HR.csv"), hr).unwrap();

    dir
}

fn config(data_root: &Path, output_root: &Path) -> Config {
    Config {
        data_root: data_root.to_path_buf(),
        output_root: output_root.to_path_buf(),
        window: WindowConfig {
            lookback_secs: 2,
            lookahead_secs: 1,
        },
        streams: vec![
            StreamConfig {
                name: "eye".to_string(),
                file_name: "eye_tracking.csv".to_string(),
                fields: vec!["LeftPupilDiameter".to_string()],
                validity_field: Some("Valid".to_string()),
                layout: StreamLayout::Tabular {
                    time_column: "Time".to_string(),
                    time_format: TimeFormat::TimeOfDay("%H-%M-%S-%f".to_string()),
                },
            },
            StreamConfig {
                name: "hr".to_string(),
                file_name: "HR.csv".to_string(),
                fields: vec!["hr".to_string()],
                validity_field: None,
                layout: StreamLayout::Physiological {
                    zone: ClockZone::default(),
                },
            },
        ],
        ..Config::default()
    }
}

fn read_table(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

fn read_stats(output: &Path) -> RunStatsSnapshot {
    let content = fs::read_to_string(output.join(STATS_FILE)).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_align_dataset_end_to_end() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_session(data.path(), "sim-a", "p01");

    let config = config(data.path(), output.path());
    let stats = RunStats::new();
    pipeline::run_alignment(&config, &stats, &AtomicBool::new(true)).unwrap();

    let (header, rows) = read_table(&output.path().join(METADATA_FILE));
    assert_eq!(
        header,
        vec![
            "uid",
            "individual",
            "simulation",
            "event",
            "frames",
            "eye",
            "hr",
            "cs_severity_class",
            "severity_score",
            "fms"
        ]
    );
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    let uid = &first[0];
    assert_eq!(uid.len(), 16);
    assert_eq!(&first[1..4], &["p01", "sim-a", "0"]);
    assert_eq!(first[4], format!("frames/frames-{uid}.csv"));
    assert_eq!(first[5], format!("eye/eye-{uid}.csv"));
    assert_eq!(first[6], format!("hr/hr-{uid}.csv"));
    assert_eq!(&first[7..], &["2", "1.5", "3"]);

    // The unknown marker is skipped; the third event keeps its position.
    assert_eq!(rows[1][3], "2");
    assert_eq!(rows[1][7], "0");
    assert_ne!(rows[1][0], *uid);

    let eye = fs::read_to_string(output.path().join(&first[5])).unwrap();
    assert_eq!(
        eye,
        "time,severity_score,severity_class,LeftPupilDiameter\n\
         10-00-28,1.500,2,4.000\n\
         10-00-29,1.500,2,4.000\n\
         10-00-30,1.500,2,4.000\n\
         10-00-31,1.500,2,4.000\n"
    );

    let hr = fs::read_to_string(output.path().join(&first[6])).unwrap();
    let hr_lines: Vec<&str> = hr.lines().collect();
    assert_eq!(hr_lines.len(), 5);
    assert_eq!(hr_lines[1], "10-00-28,1.500,2,88.000");
    assert_eq!(hr_lines[4], "10-00-31,1.500,2,91.000");

    let frames = fs::read_to_string(output.path().join(&first[4])).unwrap();
    let frame_lines: Vec<&str> = frames.lines().collect();
    assert_eq!(frame_lines[0], "time,frame_index,file_name");
    assert_eq!(frame_lines[1], "10-00-28,29,Frame-29-10-00-28-000.png");
    assert_eq!(frame_lines.len(), 5);

    let snapshot = read_stats(output.path());
    assert_eq!(snapshot.sessions_processed, 1);
    assert_eq!(snapshot.events_seen, 3);
    assert_eq!(snapshot.events_aligned, 2);
    assert_eq!(snapshot.events_skipped, 1);
    assert_eq!(snapshot.artifacts_written, 6);
}

#[test]
fn test_broken_session_does_not_stop_run() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_session(data.path(), "sim-a", "p01");
    let broken = write_session(data.path(), "sim-a", "p02");
    fs::remove_file(broken.join("eye_tracking.csv")).unwrap();

    let config = config(data.path(), output.path());
    let stats = RunStats::new();
    pipeline::run_alignment(&config, &stats, &AtomicBool::new(true)).unwrap();

    let (_, rows) = read_table(&output.path().join(METADATA_FILE));
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row[1] == "p01"));

    let snapshot = stats.stats();
    assert_eq!(snapshot.sessions_processed, 1);
    assert_eq!(snapshot.sessions_failed, 1);
}

#[test]
fn test_parallel_run_matches_sequential() {
    let data = tempfile::tempdir().unwrap();
    for individual in ["p01", "p02", "p03"] {
        write_session(data.path(), "sim-a", individual);
    }

    let sequential_out = tempfile::tempdir().unwrap();
    let parallel_out = tempfile::tempdir().unwrap();

    let sequential = config(data.path(), sequential_out.path());
    pipeline::run_alignment(&sequential, &RunStats::new(), &AtomicBool::new(true)).unwrap();

    let mut parallel = config(data.path(), parallel_out.path());
    parallel.workers = 4;
    pipeline::run_alignment(&parallel, &RunStats::new(), &AtomicBool::new(true)).unwrap();

    let (_, seq_rows) = read_table(&sequential_out.path().join(METADATA_FILE));
    let (_, par_rows) = read_table(&parallel_out.path().join(METADATA_FILE));
    assert_eq!(seq_rows.len(), 6);
    assert_eq!(seq_rows.len(), par_rows.len());
    for (a, b) in seq_rows.iter().zip(&par_rows) {
        // Everything but the minted uid and the references built from it.
        assert_eq!(&a[1..4], &b[1..4]);
        assert_eq!(&a[7..], &b[7..]);
    }
}

#[test]
fn test_unclassified_policy_keeps_out_of_range_events() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let dir = write_session(data.path(), "sim-a", "p01");
    fs::write(
        dir.join("verbal_global.csv"),
        "Time,Frame,CS,CSG\n2021.05.03 10:00:30:000000,31,3,42\n",
    )
    .unwrap();

    let mut config = config(data.path(), output.path());
    let stats = RunStats::new();
    pipeline::run_alignment(&config, &stats, &AtomicBool::new(true)).unwrap();
    assert_eq!(stats.stats().events_skipped, 1);

    config.severity.out_of_range = OutOfRangePolicy::Unclassified;
    let stats = RunStats::new();
    pipeline::run_alignment(&config, &stats, &AtomicBool::new(true)).unwrap();
    assert_eq!(stats.stats().events_aligned, 1);

    let (_, rows) = read_table(&output.path().join(METADATA_FILE));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][7], "");
    assert_eq!(rows[0][8], "42");
}

#[test]
fn test_interrupted_run_leaves_valid_table() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_session(data.path(), "sim-a", "p01");

    let config = config(data.path(), output.path());
    let stats = RunStats::new();
    pipeline::run_alignment(&config, &stats, &AtomicBool::new(false)).unwrap();

    let (header, rows) = read_table(&output.path().join(METADATA_FILE));
    assert_eq!(header.len(), 10);
    assert!(rows.is_empty());
    assert_eq!(read_stats(output.path()).sessions_processed, 0);
}

fn write_raw_ratings(root: &Path, simulation: &str, individual: &str, ratings: &[u32]) {
    let dir = root.join(simulation).join(individual);
    fs::create_dir_all(&dir).unwrap();
    let mut log = String::from("Time,Frame,CS\n");
    for (i, rating) in ratings.iter().enumerate() {
        log.push_str(&format!(
            "2021.05.03 10:0{i}:00:000000,{},{rating}\n",
            (i + 1) * 100
        ));
    }
    fs::write(dir.join("verbal_feedback.csv"), log).unwrap();
}

fn consensus_config(data_root: &Path, elicitations: usize) -> Config {
    let mut config = Config::default();
    config.data_root = data_root.to_path_buf();
    config.events.elicitations = elicitations;
    config
}

#[test]
fn test_consensus_then_bands() {
    let data = tempfile::tempdir().unwrap();
    write_raw_ratings(data.path(), "sim-a", "p01", &[0, 2, 4, 6]);
    write_raw_ratings(data.path(), "sim-a", "p02", &[2, 4, 6, 8]);
    let config = consensus_config(data.path(), 4);

    assert_eq!(pipeline::run_consensus(&config).unwrap(), 2);

    let (header, rows) = read_table(&data.path().join("sim-a/p01/verbal_global.csv"));
    assert_eq!(header, vec!["Time", "Frame", "CS", "CSG"]);
    let scores: Vec<&str> = rows.iter().map(|r| r[3].as_str()).collect();
    assert_eq!(scores, vec!["1", "3", "5", "7"]);

    // Scores 1, 3, 5, 7 twice: the median is 4.
    let bands = pipeline::run_bands(&config).unwrap();
    assert!((bands.medium - 4.0).abs() < 1e-9);
    assert!(bands.low < bands.medium && bands.medium < bands.high);
}

#[test]
fn test_bands_with_tied_quartiles_fail() {
    let data = tempfile::tempdir().unwrap();
    write_raw_ratings(data.path(), "sim-a", "p01", &[0, 2, 4]);
    write_raw_ratings(data.path(), "sim-a", "p02", &[2, 2]);
    let config = consensus_config(data.path(), 3);

    assert_eq!(pipeline::run_consensus(&config).unwrap(), 2);

    let (_, rows) = read_table(&data.path().join("sim-a/p02/verbal_global.csv"));
    let scores: Vec<&str> = rows.iter().map(|r| r[3].as_str()).collect();
    assert_eq!(scores, vec!["1", "2"]);

    // Scores 1, 2, 2, 1, 2 put the median and upper quartile on the same value.
    let err = pipeline::run_bands(&config).unwrap_err();
    assert!(matches!(err, AlignError::InvalidBands(_)));
}

#[test]
fn test_unwritable_consensus_log_is_skipped() {
    let data = tempfile::tempdir().unwrap();
    write_raw_ratings(data.path(), "sim-a", "p01", &[1, 2]);
    write_raw_ratings(data.path(), "sim-a", "p02", &[3, 4]);
    // A directory in place of the output file makes the write fail.
    fs::create_dir_all(data.path().join("sim-a/p01/verbal_global.csv")).unwrap();
    let config = consensus_config(data.path(), 2);

    assert_eq!(pipeline::run_consensus(&config).unwrap(), 1);

    let (_, rows) = read_table(&data.path().join("sim-a/p02/verbal_global.csv"));
    let scores: Vec<&str> = rows.iter().map(|r| r[3].as_str()).collect();
    assert_eq!(scores, vec!["2", "3"]);
}
