//! Pipeline configuration

use crate::error::{PipelineError, Result};
use mobility_data::AggregationConfig;
use mobility_features::TrendConfig;
use mobility_model::{ClusterConfig, ForecastConfig};
use mobility_output::ExportFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for every phase.
///
/// Every field falls back to its default, so a JSON file only needs the
/// values it overrides:
///
/// ```json
/// { "forecast": { "labels": { "horizon": 6 } }, "format": "csv" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw log aggregation
    pub aggregation: AggregationConfig,
    /// Slope estimation for district features
    pub trend: TrendConfig,
    /// Labeling and regressor parameters
    pub forecast: ForecastConfig,
    /// Filter, embedding and k-means parameters
    pub cluster: ClusterConfig,
    /// Frame artifact format (default: parquet)
    pub format: ExportFormat,
}

impl PipelineConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Pretty JSON with every value spelled out.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
