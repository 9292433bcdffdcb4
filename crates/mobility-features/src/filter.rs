//! Balanced pre-clustering filter.
//!
//! Drops districts too small to carry a signal and rows whose labels are
//! bare numbers (an artifact of malformed source files). A district stays
//! when it clears either the population or the activity threshold.

use crate::engineer::{DistrictFeatureVector, DistrictFeatures};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Filter thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancedFilterConfig {
    /// Keep when `mean_pop_adult` reaches this (default: 1000)
    pub min_mean_pop_adult: f64,
    /// Keep when `mean_total_demo` reaches this (default: 20)
    pub min_mean_total_demo: f64,
    /// Minimum panel months observed (default: 2)
    pub min_observed_months: u32,
    /// Drop districts whose state or district label is purely numeric
    pub exclude_numeric_labels: bool,
}

impl Default for BalancedFilterConfig {
    fn default() -> Self {
        Self {
            min_mean_pop_adult: 1000.0,
            min_mean_total_demo: 20.0,
            min_observed_months: 2,
            exclude_numeric_labels: true,
        }
    }
}

/// Applies [`BalancedFilterConfig`] to district features.
#[derive(Debug, Clone, Default)]
pub struct BalancedFilter {
    config: BalancedFilterConfig,
}

impl BalancedFilter {
    /// Create a filter.
    pub const fn new(config: BalancedFilterConfig) -> Self {
        Self { config }
    }

    /// Whether a district passes every rule.
    pub fn keeps(&self, vector: &DistrictFeatureVector) -> bool {
        let pop = vector.get("mean_pop_adult").unwrap_or(0.0);
        let demo = vector.get("mean_total_demo").unwrap_or(0.0);
        let large_enough =
            pop >= self.config.min_mean_pop_adult || demo >= self.config.min_mean_total_demo;
        let numeric = self.config.exclude_numeric_labels
            && (is_numeric_label(&vector.state) || is_numeric_label(&vector.district));

        large_enough && vector.n_months >= self.config.min_observed_months && !numeric
    }

    /// Keep the passing districts.
    pub fn apply(&self, mut features: DistrictFeatures) -> DistrictFeatures {
        let before = features.len();
        features.retain(|v| self.keeps(v));
        info!(
            kept = features.len(),
            dropped = before - features.len(),
            "balanced filter applied"
        );
        features
    }
}

/// Non-empty and made only of numeric characters.
pub fn is_numeric_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(char::is_numeric)
}
