//! Model error types.

use mobility_data::DataError;
use mobility_features::FeatureError;
use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while fitting or applying models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No rows to train on
    #[error("Empty training matrix")]
    EmptyTrainingSet,

    /// No column carries any variation
    #[error("Training matrix of shape {rows}x{cols} has zero numerical rank after centering")]
    RankDeficient {
        /// Number of rows
        rows: usize,
        /// Number of columns
        cols: usize,
    },

    /// Fewer samples than a model needs
    #[error("Insufficient samples: need at least {required}, got {actual}")]
    InsufficientSamples {
        /// Required number of samples
        required: usize,
        /// Actual number of samples
        actual: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A required input column is absent
    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    /// Model used before fitting
    #[error("Model has not been fitted")]
    NotFitted,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Feature layer error
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Data layer error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
