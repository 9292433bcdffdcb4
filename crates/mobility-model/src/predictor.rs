//! Two-target predictor
//!
//! Trains one regressor for the movement index and one for the student
//! share on the same feature matrix. Null feature values enter the matrix
//! as 0.0; a missing feature column is an error.

use crate::capability::Regressor;
use crate::error::{ModelError, Result};
use crate::linalg::numerical_rank;
use mobility_features::ForecastPairs;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Model input columns, in matrix column order.
pub const FEATURE_COLUMNS: [&str; 8] = [
    "movement_index",
    "student_ratio",
    "bio_student",
    "bio_adult",
    "total_demo",
    "pop_adult",
    "month_index",
    "quarter",
];

/// Build the feature matrix from a frame holding [`FEATURE_COLUMNS`].
pub fn feature_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let mut x = Array2::<f64>::zeros((df.height(), FEATURE_COLUMNS.len()));
    for (j, name) in FEATURE_COLUMNS.iter().enumerate() {
        let column = df
            .column(name)
            .map_err(|_| ModelError::MissingColumn((*name).to_string()))?
            .cast(&DataType::Float64)?;
        for (i, value) in column.f64()?.into_iter().enumerate() {
            x[[i, j]] = value.unwrap_or(0.0);
        }
    }
    Ok(x)
}

/// Root mean squared error; 0 for empty input.
pub fn rmse(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// Importance of one input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Column name
    pub feature: String,
    /// Share of the total impurity decrease
    pub importance: f64,
}

/// Predictions for both targets, one per input row.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPredictions {
    /// Predicted movement index
    pub movement: Array1<f64>,
    /// Predicted student share
    pub student: Array1<f64>,
}

/// Movement and student-share regressors sharing one feature set.
#[derive(Debug)]
pub struct Predictor<R: Regressor> {
    regressor: R,
    movement: Option<R::Model>,
    student: Option<R::Model>,
}

impl<R: Regressor> Predictor<R> {
    /// Wrap an unfitted regressor.
    pub const fn new(regressor: R) -> Self {
        Self {
            regressor,
            movement: None,
            student: None,
        }
    }

    /// Fit both targets on labeled pairs.
    ///
    /// Fails on an empty table or on a feature matrix with no informative
    /// column.
    pub fn fit(&mut self, pairs: &ForecastPairs) -> Result<()> {
        if pairs.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let x = feature_matrix(&pairs.to_frame()?)?;
        let rank = numerical_rank(&x)?;
        if rank == 0 {
            return Err(ModelError::RankDeficient {
                rows: x.nrows(),
                cols: x.ncols(),
            });
        }
        debug!(rows = x.nrows(), rank, "training matrix validated");

        let movement = Array1::from(pairs.movement_targets());
        let student = Array1::from(pairs.student_targets());
        self.movement = Some(self.regressor.fit(&x, &movement)?);
        self.student = Some(self.regressor.fit(&x, &student)?);
        info!(rows = x.nrows(), "forecast regressors fitted");
        Ok(())
    }

    /// Predict both targets for every row of `df`.
    pub fn predict(&self, df: &DataFrame) -> Result<TargetPredictions> {
        let (Some(movement), Some(student)) = (&self.movement, &self.student) else {
            return Err(ModelError::NotFitted);
        };
        let x = feature_matrix(df)?;
        Ok(TargetPredictions {
            movement: self.regressor.predict(movement, &x)?,
            student: self.regressor.predict(student, &x)?,
        })
    }

    /// Named importances for the movement and student models.
    pub fn importances(&self) -> Option<(Vec<FeatureImportance>, Vec<FeatureImportance>)> {
        let named = |model: &R::Model| {
            self.regressor.feature_importances(model).map(|values| {
                FEATURE_COLUMNS
                    .iter()
                    .zip(values.iter())
                    .map(|(name, &importance)| FeatureImportance {
                        feature: (*name).to_string(),
                        importance,
                    })
                    .collect::<Vec<_>>()
            })
        };
        Some((named(self.movement.as_ref()?)?, named(self.student.as_ref()?)?))
    }
}
