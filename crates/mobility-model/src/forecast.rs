//! Forecast stage
//!
//! Labels the panel, fits the predictor on every pair, reports in-sample
//! error, then predicts `horizon` months past each district's last
//! observation.

use crate::error::Result;
use crate::forest::{ForestConfig, RandomForestRegressor};
use crate::predictor::{FeatureImportance, Predictor, rmse};
use mobility_features::{ForecastLabeler, LabelConfig};
use mobility_data::MonthlyPanel;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Forecast configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Target labeling
    pub labels: LabelConfig,
    /// Regressor hyperparameters
    pub forest: ForestConfig,
}

/// Summary of a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Months ahead
    pub horizon: u32,
    /// Labeled training rows
    pub training_rows: usize,
    /// Districts in the forward forecast
    pub forecast_districts: usize,
    /// In-sample RMSE of the movement model
    pub movement_rmse: f64,
    /// In-sample RMSE of the student-share model
    pub student_rmse: f64,
    /// Movement model importances
    pub movement_importances: Vec<FeatureImportance>,
    /// Student-share model importances
    pub student_importances: Vec<FeatureImportance>,
}

/// Frames and metrics produced by [`Forecaster::run`].
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    /// Pairs with targets and in-sample predictions
    pub historical: DataFrame,
    /// Last observed row per district with forward predictions
    pub future: DataFrame,
    /// Run summary
    pub metrics: ForecastMetrics,
}

/// Runs labeling, fitting and prediction.
#[derive(Debug, Clone, Default)]
pub struct Forecaster {
    config: ForecastConfig,
}

impl Forecaster {
    /// Create a forecaster.
    pub const fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Forecast from a panel in any row order.
    pub fn run(&self, panel: &MonthlyPanel) -> Result<ForecastOutput> {
        let mut panel = panel.clone();
        panel.sort_by_district_key();

        let labeler = ForecastLabeler::new(&self.config.labels)?;
        let horizon = labeler.horizon();
        let pairs = labeler.label(&panel)?;

        let mut predictor = Predictor::new(RandomForestRegressor::new(self.config.forest.clone()));
        predictor.fit(&pairs)?;

        let mut historical = pairs.to_frame()?;
        let fitted = predictor.predict(&historical)?;
        let movement_rmse = rmse(&Array1::from(pairs.movement_targets()), &fitted.movement);
        let student_rmse = rmse(&Array1::from(pairs.student_targets()), &fitted.student);
        historical.with_column(Column::new("pred_mov".into(), fitted.movement.to_vec()))?;
        historical.with_column(Column::new("pred_std".into(), fitted.student.to_vec()))?;

        let snapshot = labeler.snapshot(&panel)?;
        let mut future = snapshot.to_frame()?;
        let ahead = predictor.predict(&future)?;
        future.with_column(Column::new(
            format!("pred_mov_{horizon}m").into(),
            ahead.movement.to_vec(),
        ))?;
        future.with_column(Column::new(
            format!("pred_std_{horizon}m").into(),
            ahead.student.to_vec(),
        ))?;

        let (movement_importances, student_importances) =
            predictor.importances().unwrap_or_default();
        info!(
            pairs = pairs.len(),
            districts = snapshot.len(),
            movement_rmse,
            student_rmse,
            "forecast complete"
        );

        Ok(ForecastOutput {
            historical,
            future,
            metrics: ForecastMetrics {
                horizon,
                training_rows: pairs.len(),
                forecast_districts: snapshot.len(),
                movement_rmse,
                student_rmse,
                movement_importances,
                student_importances,
            },
        })
    }
}
