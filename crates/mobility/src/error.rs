//! Pipeline errors

use mobility_data::DataError;
use mobility_features::FeatureError;
use mobility_model::ModelError;
use mobility_output::ExportError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running a pipeline phase
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Aggregation or panel construction failed
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// Feature engineering or labeling failed
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Fitting or clustering failed
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Artifact export or import failed
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Configuration could not be parsed
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
