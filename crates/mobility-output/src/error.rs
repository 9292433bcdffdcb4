//! Export error types.

use thiserror::Error;

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Columnar serialization error.
    #[error("Frame serialization error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// An expected artifact is absent.
    #[error("Artifact not found: {0}")]
    MissingArtifact(String),
}
