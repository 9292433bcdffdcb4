//! Artifact tree under an output root.

use crate::export::ExportFormat;
use std::path::{Path, PathBuf};

/// Monthly panel file stem.
pub const MONTHLY_PANEL: &str = "monthly";
/// Forecast artifact directory.
pub const FORECAST_DIR: &str = "forecast";
/// Clustering artifact directory.
pub const CLUSTERING_DIR: &str = "clustering";
/// Run report file name.
pub const REPORT_FILE: &str = "report.json";

/// Resolves artifact paths for one output root and frame format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    format: ExportFormat,
}

impl ArtifactLayout {
    /// Create a layout.
    pub fn new(root: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Frame format.
    pub const fn format(&self) -> ExportFormat {
        self.format
    }

    fn frame(&self, dir: Option<&str>, stem: &str) -> PathBuf {
        let file = format!("{stem}.{}", self.format.extension());
        match dir {
            Some(dir) => self.root.join(dir).join(file),
            None => self.root.join(file),
        }
    }

    /// `monthly.<ext>`
    pub fn monthly_panel(&self) -> PathBuf {
        self.frame(None, MONTHLY_PANEL)
    }

    /// `forecast/historical_predictions.<ext>`
    pub fn historical_predictions(&self) -> PathBuf {
        self.frame(Some(FORECAST_DIR), "historical_predictions")
    }

    /// `forecast/future_forecast.<ext>`
    pub fn future_forecast(&self) -> PathBuf {
        self.frame(Some(FORECAST_DIR), "future_forecast")
    }

    /// `clustering/district_features.<ext>`
    pub fn district_features(&self) -> PathBuf {
        self.frame(Some(CLUSTERING_DIR), "district_features")
    }

    /// `clustering/pca_embedding.<ext>`
    pub fn pca_embedding(&self) -> PathBuf {
        self.frame(Some(CLUSTERING_DIR), "pca_embedding")
    }

    /// `clustering/hierarchy.<ext>`
    pub fn hierarchy(&self) -> PathBuf {
        self.frame(Some(CLUSTERING_DIR), "hierarchy")
    }

    /// `report.json`
    pub fn report(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }
}
