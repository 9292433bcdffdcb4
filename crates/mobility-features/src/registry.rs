//! Feature Registry
//!
//! Central catalog of the per-district features. The engineer computes
//! exactly these columns in this order, and the clustering stage selects
//! its inputs by category.

use mobility_data::PanelMetric;
use std::collections::HashMap;

/// Feature categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureCategory {
    /// Mean of a metric over the district's history
    Mean,
    /// Sample standard deviation of a metric
    Std,
    /// Least-squares slope of a metric against `month_index`
    Slope,
}

impl FeatureCategory {
    /// Column-name prefix shared by the category.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Mean => "mean_",
            Self::Std => "std_",
            Self::Slope => "slope_",
        }
    }
}

/// Feature metadata
#[derive(Debug, Clone, Copy)]
pub struct FeatureInfo {
    /// Output column name (unique)
    pub name: &'static str,
    /// Feature category
    pub category: FeatureCategory,
    /// Panel metric the feature summarises
    pub metric: PanelMetric,
    /// Brief description
    pub description: &'static str,
}

const fn feature(
    name: &'static str,
    category: FeatureCategory,
    metric: PanelMetric,
    description: &'static str,
) -> FeatureInfo {
    FeatureInfo {
        name,
        category,
        metric,
        description,
    }
}

/// Get all available feature info, in output column order
pub fn available_features() -> Vec<FeatureInfo> {
    use FeatureCategory::{Mean, Slope, Std};
    use PanelMetric::*;

    vec![
        // Level
        feature("mean_total_demo", Mean, TotalDemo, "Average monthly demographic updates"),
        feature("mean_student_ratio", Mean, StudentRatio, "Average student share of updates"),
        feature("mean_adult_ratio", Mean, AdultRatio, "Average adult share of updates"),
        feature("mean_movement_index", Mean, MovementIndex, "Average mobility proxy"),
        feature("mean_bio_student", Mean, BioStudent, "Average student biometric updates"),
        feature("mean_bio_adult", Mean, BioAdult, "Average adult biometric updates"),
        feature("mean_pop_adult", Mean, PopAdult, "Average adult enrolments (population proxy)"),
        // Volatility
        feature("std_total_demo", Std, TotalDemo, "Volatility of demographic updates"),
        feature("std_student_ratio", Std, StudentRatio, "Volatility of the student share"),
        feature("std_movement_index", Std, MovementIndex, "Volatility of the mobility proxy"),
        // Trend
        feature("slope_student_ratio", Slope, StudentRatio, "Monthly trend of the student share"),
        feature("slope_movement_index", Slope, MovementIndex, "Monthly trend of the mobility proxy"),
    ]
}

/// Get features by category
pub fn features_by_category(category: FeatureCategory) -> Vec<FeatureInfo> {
    available_features()
        .into_iter()
        .filter(|f| f.category == category)
        .collect()
}

/// Get feature info by name
pub fn get_feature_info(name: &str) -> Option<FeatureInfo> {
    available_features().into_iter().find(|f| f.name == name)
}

/// Position of a feature in [`available_features`]
pub fn feature_index(name: &str) -> Option<usize> {
    available_features().iter().position(|f| f.name == name)
}

/// Get a map of all features indexed by name
pub fn feature_map() -> HashMap<&'static str, FeatureInfo> {
    available_features()
        .into_iter()
        .map(|f| (f.name, f))
        .collect()
}

/// Names of the features fed to clustering: every mean, std and slope column
pub fn clustering_feature_names() -> Vec<&'static str> {
    available_features()
        .into_iter()
        .filter(|f| f.name.starts_with(f.category.prefix()))
        .map(|f| f.name)
        .collect()
}
