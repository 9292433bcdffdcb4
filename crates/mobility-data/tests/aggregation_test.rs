//! Integration tests for streaming aggregation and panel construction.

use approx::assert_relative_eq;
use mobility_data::{
    AggregationConfig, DataError, DistrictKey, Month, MonthlyAggregate, PanelBuilder, StreamKind,
    StreamingAggregator,
};
use std::fs;
use std::path::{Path, PathBuf};

const DEMO_HEADER: &str = "date,state,district,pincode,demo_age_5_17,demo_age_17_";

fn demo_rows() -> Vec<String> {
    let mut rows = Vec::new();
    for (day, month, state, district, student, adult) in [
        (1, 1, "Bihar", "Patna", 3, 10),
        (15, 1, "bihar ", "patna", 2, 4),
        (3, 1, "Goa", "North Goa", 1, 1),
        (9, 2, "Bihar", "Patna", 5, 5),
        (10, 2, "Goa", "North Goa", 0, 7),
        (11, 3, "Goa", "North Goa", 2, 2),
        (12, 3, "Bihar", "Gaya", 8, 1),
        (13, 4, "Bihar", "Patna", 6, 6),
    ] {
        rows.push(format!(
            "{day:02}-{month:02}-2025,{state},{district},80000{day},{student},{adult}"
        ));
    }
    rows.push("not-a-date,Bihar,Patna,800001,100,100".to_string());
    rows.push("20-04-2025,Bihar,Patna,800001,abc,1".to_string());
    rows
}

fn write_split(dir: &Path, rows: &[String], parts: usize) -> Vec<PathBuf> {
    let per_file = rows.len().div_ceil(parts);
    rows.chunks(per_file)
        .enumerate()
        .map(|(i, chunk)| {
            let path = dir.join(format!("part_{i}.csv"));
            fs::write(&path, format!("{DEMO_HEADER}\n{}\n", chunk.join("\n"))).unwrap();
            path
        })
        .collect()
}

fn aggregate(files: &[PathBuf], chunk_size: usize, parallel: bool) -> MonthlyAggregate {
    StreamingAggregator::new(AggregationConfig {
        chunk_size,
        parallel,
    })
    .aggregate_files(StreamKind::Demographic, files, |_| {})
    .unwrap()
}

#[test]
fn test_result_independent_of_file_split_chunk_size_and_order() {
    let rows = demo_rows();
    let single_dir = tempfile::tempdir().unwrap();
    let reference = aggregate(&write_split(single_dir.path(), &rows, 1), 1_000, false);

    for parts in 1..=4 {
        for chunk_size in [1, 2, 3, 100] {
            let dir = tempfile::tempdir().unwrap();
            let mut files = write_split(dir.path(), &rows, parts);
            assert_eq!(aggregate(&files, chunk_size, false), reference);
            assert_eq!(aggregate(&files, chunk_size, true), reference);
            files.reverse();
            assert_eq!(aggregate(&files, chunk_size, false), reference);
        }
    }
}

#[test]
fn test_sums_coerce_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let aggregate = aggregate(&write_split(dir.path(), &demo_rows(), 2), 2, true);

    let patna = DistrictKey::new("BIHAR", "PATNA");
    let jan = Month::new(2025, 1).unwrap();
    let apr = Month::new(2025, 4).unwrap();
    assert_eq!(aggregate.get(&patna, jan).unwrap().values(), &[5, 14]);
    // the "abc" counter counts as zero, the unparseable date is dropped
    assert_eq!(aggregate.get(&patna, apr).unwrap().values(), &[6, 7]);
    assert_eq!(aggregate.district_count(), 3);
}

#[test]
fn test_directory_without_csv_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StreamingAggregator::default()
        .aggregate_directory(StreamKind::Biometric, dir.path())
        .unwrap_err();
    assert!(matches!(err, DataError::NoInputFiles { .. }));
}

#[test]
fn test_missing_cohort_column_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("bio.csv"),
        "date,state,district,pincode,bio_age_5_17\n01-01-2025,A,B,1,2\n",
    )
    .unwrap();
    let err = StreamingAggregator::default()
        .aggregate_directory(StreamKind::Biometric, dir.path())
        .unwrap_err();
    assert!(matches!(err, DataError::MissingColumn { .. }));
}

#[test]
fn test_six_month_scenario_movement_index() {
    let dir = tempfile::tempdir().unwrap();
    let demo_dir = dir.path().join("demo");
    let bio_dir = dir.path().join("bio");
    let enrol_dir = dir.path().join("enrol");
    for d in [&demo_dir, &bio_dir, &enrol_dir] {
        fs::create_dir_all(d).unwrap();
    }

    let totals = [10, 12, 9, 15, 11, 14];
    let mut demo = vec![DEMO_HEADER.to_string()];
    let mut enrol = vec!["date,state,district,pincode,age_0_5,age_5_17,age_18_greater".to_string()];
    for (i, total) in totals.iter().enumerate() {
        let month = i + 1;
        demo.push(format!("05-{month:02}-2025,Kerala,Idukki,685501,{},{}", total / 2, total - total / 2));
        enrol.push(format!("05-{month:02}-2025,Kerala,Idukki,685501,1,1,100"));
    }
    fs::write(demo_dir.join("d.csv"), demo.join("\n")).unwrap();
    fs::write(enrol_dir.join("e.csv"), enrol.join("\n")).unwrap();
    fs::write(
        bio_dir.join("b.csv"),
        "date,state,district,pincode,bio_age_5_17,bio_age_17_\n05-01-2025,Kerala,Idukki,685501,3,4\n",
    )
    .unwrap();

    let aggregator = StreamingAggregator::default();
    let panel = PanelBuilder::new()
        .build(
            &aggregator.aggregate_directory(StreamKind::Demographic, &demo_dir).unwrap(),
            &aggregator.aggregate_directory(StreamKind::Biometric, &bio_dir).unwrap(),
            &aggregator.aggregate_directory(StreamKind::Enrolment, &enrol_dir).unwrap(),
        )
        .unwrap();

    assert_eq!(panel.len(), 6);
    for (row, total) in panel.rows().iter().zip(totals) {
        assert_eq!(row.total_demo, total);
        assert_relative_eq!(row.movement_index, total as f64 / 100.0, epsilon = 1e-12);
    }
    let indices: Vec<u32> = panel.rows().iter().map(|r| r.month_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(panel.rows()[0].bio_adult, Some(4));
    assert_eq!(panel.rows()[1].bio_adult, None);
}
