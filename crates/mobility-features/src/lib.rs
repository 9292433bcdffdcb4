#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mobility-panel/mobility/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engineer;
pub mod error;
pub mod filter;
pub mod labeler;
pub mod registry;
pub mod trend;

#[cfg(test)]
mod testing;

pub use engineer::{DistrictFeatureVector, DistrictFeatures, FeatureEngineer};
pub use error::{FeatureError, Result};
pub use filter::{BalancedFilter, BalancedFilterConfig, is_numeric_label};
pub use labeler::{ForecastLabeler, ForecastPair, ForecastPairs, LabelConfig};
pub use registry::{
    FeatureCategory, FeatureInfo, available_features, clustering_feature_names,
    features_by_category, get_feature_info,
};
pub use trend::{TrendConfig, least_squares_slope, trend_slope};

use mobility_data::MonthlyPanel;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reject a panel that is not strictly ordered by `(district_key, month_index)`.
pub(crate) fn ensure_sorted(panel: &MonthlyPanel, stage: &'static str) -> Result<()> {
    match panel.first_unsorted() {
        Some(row) => Err(FeatureError::UnsortedInput { stage, row }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
