//! End-to-end phase tests on synthetic raw logs.

use mobility::data::{DataError, StreamKind};
use mobility::output::{ExportError, ExportFormat, read_frame};
use mobility::{Pipeline, PipelineConfig, PipelineError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const DISTRICTS: [(&str, &str); 7] = [
    ("Bihar", "Patna"),
    ("Bihar", "Gaya"),
    ("Bihar", "Nalanda"),
    ("Goa", "North Goa"),
    ("Goa", "South Goa"),
    ("Kerala", "Wayanad"),
    // numeric label from a malformed file; aggregated but never clustered
    ("West Bengal", "700"),
];
const MONTHS: u32 = 8;

fn write_stream(raw: &Path, stream: StreamKind, header: &str, row: impl Fn(usize, u32) -> String) {
    let dir = raw.join(stream.directory_name());
    fs::create_dir_all(&dir).unwrap();
    // two files split by month, to exercise the merge
    for (part, months) in [(0, 0..MONTHS / 2), (1, MONTHS / 2..MONTHS)] {
        let mut body = vec![header.to_string()];
        for m in months {
            for (d, (state, district)) in DISTRICTS.iter().enumerate() {
                body.push(format!(
                    "15-{:02}-2025,{state},{district},8000{d}{m},{}",
                    m + 1,
                    row(d, m)
                ));
            }
        }
        fs::write(dir.join(format!("part_{part}.csv")), body.join("\n") + "\n").unwrap();
    }
}

fn write_raw(raw: &Path) {
    write_stream(
        raw,
        StreamKind::Demographic,
        "date,state,district,pincode,demo_age_5_17,demo_age_17_",
        |d, m| {
            let d = d as u32;
            format!("{},{}", 5 + d * 3 + m * (d % 3), 20 + d * 10 + (m * d) % 7)
        },
    );
    write_stream(
        raw,
        StreamKind::Biometric,
        "date,state,district,pincode,bio_age_5_17,bio_age_17_",
        |d, m| format!("{},{}", d as u32 + m, 2 * d as u32 + 1),
    );
    write_stream(
        raw,
        StreamKind::Enrolment,
        "date,state,district,pincode,age_0_5,age_5_17,age_18_greater",
        |d, m| format!("2,3,{}", 500 + d as u32 * 150 + m * 5),
    );
}

fn small_config(format: ExportFormat) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.forecast.forest.n_trees = 12;
    config.forecast.forest.max_depth = 4;
    config.format = format;
    config
}

#[test]
fn test_run_all_writes_every_artifact() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_raw(raw.path());

    let pipeline = Pipeline::new(small_config(ExportFormat::Parquet), out.path());
    let files_seen = AtomicUsize::new(0);
    let report = pipeline
        .run_all(raw.path(), |_, _| {
            files_seen.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    assert_eq!(files_seen.load(Ordering::Relaxed), 6);

    let layout = pipeline.layout();
    for path in [
        layout.monthly_panel(),
        layout.historical_predictions(),
        layout.future_forecast(),
        layout.district_features(),
        layout.pca_embedding(),
        layout.hierarchy(),
        layout.report(),
    ] {
        assert!(path.is_file(), "missing {}", path.display());
    }

    assert_eq!(report.phases, vec!["config", "aggregate", "forecast", "cluster"]);
    let aggregate = report.section("aggregate").unwrap();
    assert_eq!(aggregate["panel_rows"], 7 * MONTHS as u64);
    assert_eq!(aggregate["months"], MONTHS as u64);
    assert_eq!(aggregate["streams"].as_array().unwrap().len(), 3);

    let forecast = report.section("forecast").unwrap();
    assert_eq!(forecast["horizon"], 3);
    assert_eq!(forecast["training_rows"], 7 * (MONTHS as u64 - 3));
    assert_eq!(forecast["forecast_districts"], 7);

    let cluster = report.section("cluster").unwrap();
    assert_eq!(cluster["input_districts"], 7);
    assert_eq!(cluster["clustered_districts"], 6);
    let sized: u64 = cluster["cluster_sizes"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(sized, 6);

    let future = read_frame(&layout.future_forecast(), &[]).unwrap();
    assert_eq!(future.height(), 7);
    assert!(future.column("pred_mov_3m").is_ok());
    assert!(future.column("pred_std_3m").is_ok());

    let leftovers: Vec<_> = walk(out.path())
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
}

#[test]
fn test_csv_phases_run_separately() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_raw(raw.path());

    let pipeline = Pipeline::new(small_config(ExportFormat::Csv), out.path());
    let summary = pipeline.aggregate(raw.path(), |_, _| {}).unwrap();
    assert_eq!(summary.districts, 7);

    // labels that look numeric survive the text round trip
    let panel = pipeline.load_panel().unwrap();
    assert_eq!(panel.len(), summary.panel_rows);
    assert!(panel.rows().iter().any(|r| r.district == "700"));

    let metrics = pipeline.forecast().unwrap();
    assert_eq!(metrics.movement_importances.len(), 8);

    let clusters = pipeline.cluster().unwrap();
    assert_eq!(clusters.clustered_districts, 6);

    let hierarchy = read_frame(&pipeline.layout().hierarchy(), &["state", "cluster_label", "district"])
        .unwrap();
    let joined: Vec<String> = hierarchy
        .column("district")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    let districts: usize = joined.iter().map(|d| d.split(';').count()).sum();
    assert_eq!(districts, 6);
    assert!(!pipeline.layout().report().exists());
}

#[test]
fn test_phases_are_deterministic() {
    let raw = tempfile::tempdir().unwrap();
    write_raw(raw.path());

    let frames: Vec<_> = (0..2)
        .map(|_| {
            let out = tempfile::tempdir().unwrap();
            let pipeline = Pipeline::new(small_config(ExportFormat::Parquet), out.path());
            pipeline.aggregate(raw.path(), |_, _| {}).unwrap();
            pipeline.forecast().unwrap();
            pipeline.cluster().unwrap();
            (
                read_frame(&pipeline.layout().historical_predictions(), &[]).unwrap(),
                read_frame(&pipeline.layout().district_features(), &[]).unwrap(),
            )
        })
        .collect();

    assert!(frames[0].0.equals_missing(&frames[1].0));
    assert!(frames[0].1.equals_missing(&frames[1].1));
}

#[test]
fn test_forecast_without_panel_fails() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(PipelineConfig::default(), out.path());
    let err = pipeline.forecast().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Export(ExportError::MissingArtifact(_))
    ));
}

#[test]
fn test_missing_stream_directory_fails_before_writing() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_raw(raw.path());
    fs::remove_dir_all(raw.path().join(StreamKind::Biometric.directory_name())).unwrap();

    let pipeline = Pipeline::new(PipelineConfig::default(), out.path());
    let err = pipeline.aggregate(raw.path(), |_, _| {}).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Data(DataError::NoInputFiles { .. })
    ));
    assert!(!pipeline.layout().monthly_panel().exists());
}

fn walk(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(walk(&path));
        } else {
            found.push(path);
        }
    }
    found
}
