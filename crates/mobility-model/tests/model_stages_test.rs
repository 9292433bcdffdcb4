//! Forecast and clustering stages on synthetic panels.

use mobility_data::panel::{movement_index, ratio};
use mobility_data::{Month, MonthlyPanel, MonthlyPanelRow};
use mobility_features::FeatureEngineer;
use mobility_model::{
    ClusterConfig, ClusterEmbedder, ForecastConfig, Forecaster, ForestConfig, ModelError,
    semantic_label,
};
use polars::prelude::DataType;

fn row(district: &str, index: u32, student: i64, adult: i64, pop: Option<i64>) -> MonthlyPanelRow {
    let month = Month::new(2024 + (index / 12) as i32, index % 12 + 1).unwrap();
    let total = student + adult;
    MonthlyPanelRow {
        district_key: format!("STATE_{district}"),
        state: "STATE".to_string(),
        district: district.to_string(),
        month,
        month_index: index,
        month_num: month.month_num(),
        quarter: month.quarter(),
        student_updates: student,
        adult_updates: adult,
        total_demo: total,
        student_ratio: ratio(student, total),
        adult_ratio: ratio(adult, total),
        bio_student: Some(student / 2),
        bio_adult: None,
        age_0_5: None,
        age_5_17: None,
        pop_adult: pop,
        movement_index: movement_index(total, pop),
    }
}

/// Twelve districts over eight months with four distinct profiles.
fn panel() -> MonthlyPanel {
    let mut rows = Vec::new();
    for d in 0..12u32 {
        let name = format!("D{d:02}");
        let profile = i64::from(d % 4);
        for m in 0..8u32 {
            let growth = i64::from(m) * (profile + 1);
            let student = 10 + 30 * profile + growth + i64::from(d);
            let adult = 50 + 5 * profile * profile + i64::from(m % 3);
            let pop = Some(1000 + 400 * profile + i64::from(d) * 7);
            rows.push(row(&name, m, student, adult, pop));
        }
    }
    // Persisted order is (state, district, month): reversed here on purpose.
    rows.reverse();
    MonthlyPanel::from_rows(rows)
}

fn quick_forecast() -> Forecaster {
    Forecaster::new(ForecastConfig {
        forest: ForestConfig {
            n_trees: 20,
            ..Default::default()
        },
        ..Default::default()
    })
}

#[test]
fn test_forecast_frames_and_metrics() {
    let output = quick_forecast().run(&panel()).unwrap();

    // 12 districts x (8 - 3) pairs
    assert_eq!(output.metrics.training_rows, 60);
    assert_eq!(output.historical.height(), 60);
    assert_eq!(output.future.height(), 12);
    for column in ["movement_target", "student_target", "pred_mov", "pred_std"] {
        assert!(output.historical.column(column).is_ok(), "missing {column}");
    }
    assert!(output.future.column("pred_mov_3m").is_ok());
    assert!(output.future.column("pred_std_3m").is_ok());
    assert!(output.metrics.movement_rmse.is_finite());
    assert_eq!(output.metrics.movement_importances.len(), 8);

    let months = output
        .future
        .column("month_index")
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap();
    assert!(months.i64().unwrap().into_iter().all(|m| m == Some(7)));
}

#[test]
fn test_forecast_deterministic() {
    let a = quick_forecast().run(&panel()).unwrap();
    let b = quick_forecast().run(&panel()).unwrap();
    assert_eq!(a.metrics, b.metrics);
    assert!(a.future.equals_missing(&b.future));
}

#[test]
fn test_constant_training_matrix_is_rejected() {
    // Four months each: every pair sits at month 0 with identical values.
    let rows: Vec<_> = ["A", "B", "C"]
        .iter()
        .flat_map(|d| (0..4).map(move |m| row(d, m, 5, 5, None)))
        .collect();
    let err = quick_forecast().run(&MonthlyPanel::from_rows(rows)).unwrap_err();
    assert!(matches!(err, ModelError::RankDeficient { .. }));
}

#[test]
fn test_too_short_history_is_empty_training_set() {
    let rows = vec![row("A", 0, 1, 1, None), row("A", 1, 1, 1, None)];
    let err = quick_forecast().run(&MonthlyPanel::from_rows(rows)).unwrap_err();
    assert!(matches!(err, ModelError::EmptyTrainingSet));
}

#[test]
fn test_clustering_deterministic_and_labelled() {
    let mut panel = panel();
    panel.sort_by_district_key();
    let features = FeatureEngineer::default().compute(&panel).unwrap();

    let a = ClusterEmbedder::default().fit(features.clone()).unwrap();
    let b = ClusterEmbedder::default().fit(features).unwrap();
    assert_eq!(a.assignments(), b.assignments());
    assert_eq!(a.embedding(), b.embedding());

    assert_eq!(a.assignments().len(), 12);
    assert!(a.assignments().iter().all(|&c| c < 4));
    assert_eq!(a.cluster_sizes().values().sum::<usize>(), 12);

    let frame = a.features_frame().unwrap();
    let labels = frame.column("cluster_label").unwrap().str().unwrap();
    for (label, &cluster) in labels.into_iter().zip(a.assignments()) {
        assert_eq!(label, Some(semantic_label(cluster)));
    }
    assert_eq!(a.embedding_frame().unwrap().width(), 3);

    let hierarchy = a.hierarchy();
    let total: usize = hierarchy.iter().map(|e| e.districts.len()).sum();
    assert_eq!(total, 12);
    assert!(hierarchy.windows(2).all(|w| w[0].cluster_label < w[1].cluster_label));
    assert_eq!(a.hierarchy_frame().unwrap().height(), hierarchy.len());
}

#[test]
fn test_too_few_districts_for_clusters() {
    let rows: Vec<_> = ["A", "B"]
        .iter()
        .flat_map(|d| (0..3).map(move |m| row(d, m, 50, 50, Some(5000))))
        .collect();
    let features = FeatureEngineer::default()
        .compute(&MonthlyPanel::from_rows(rows))
        .unwrap();
    let err = ClusterEmbedder::new(ClusterConfig::default()).fit(features).unwrap_err();
    assert!(matches!(err, ModelError::InsufficientSamples { required: 4, actual: 2 }));
}
