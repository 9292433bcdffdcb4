//! Error types for data operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while reading, aggregating or assembling panel data.
///
/// Bad individual values (unparseable dates, non-numeric counters) are not
/// errors; they are coerced to missing by the normalizer.
#[derive(Debug, Error)]
pub enum DataError {
    /// A source directory holds no CSV files
    #[error("No input files found in {}", path.display())]
    NoInputFiles {
        /// Directory that was scanned
        path: PathBuf,
    },

    /// A CSV header lacks a column the stream schema requires
    #[error("Missing column '{column}' in {stream} input {}", path.display())]
    MissingColumn {
        /// Name of the absent column
        column: String,
        /// Stream being read
        stream: String,
        /// File (or reader label) being read
        path: PathBuf,
    },

    /// An aggregate of the wrong stream was passed to a consumer
    #[error("Stream mismatch: expected {expected} aggregate, got {actual}")]
    StreamMismatch {
        /// Stream the consumer required
        expected: String,
        /// Stream actually supplied
        actual: String,
    },

    /// Chunk size of zero
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// A persisted panel could not be decoded
    #[error("Invalid panel data: {0}")]
    InvalidPanel(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
