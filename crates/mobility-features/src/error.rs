//! Error types for feature construction.

use mobility_data::DataError;
use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors raised while deriving features or forecast labels.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Input not ordered by `(district_key, month_index)`
    #[error("{stage} requires input sorted by (district_key, month_index); row {row} is out of order")]
    UnsortedInput {
        /// Stage that rejected the input
        stage: &'static str,
        /// First offending row
        row: usize,
    },

    /// Rows sharing a district key disagree on their labels
    #[error("Inconsistent labels for {district_key}: '{expected}' vs '{found}'")]
    InconsistentLabels {
        /// Offending district key
        district_key: String,
        /// Labels on the first row of the group
        expected: String,
        /// Conflicting labels
        found: String,
    },

    /// Forecast horizon of zero
    #[error("Invalid forecast horizon: {0}")]
    InvalidHorizon(u32),

    /// Data layer error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
