#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mobility-panel/mobility/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod capability;
pub mod cluster;
pub mod error;
pub mod forecast;
pub mod forest;
pub mod kmeans;
pub mod linalg;
pub mod pca;
pub mod predictor;
pub mod scaler;

pub use capability::{Partitioner, Reducer, Regressor, Scaler};
pub use cluster::{
    ClusterConfig, ClusterEmbedder, ClusterResult, HierarchyEntry, UNKNOWN_LABEL, semantic_label,
};
pub use error::{ModelError, Result};
pub use forecast::{ForecastConfig, ForecastMetrics, ForecastOutput, Forecaster};
pub use forest::{ForestConfig, ForestModel, RandomForestRegressor, RegressionTree};
pub use kmeans::{KMeans, KMeansConfig};
pub use pca::Pca;
pub use predictor::{
    FEATURE_COLUMNS, FeatureImportance, Predictor, TargetPredictions, feature_matrix, rmse,
};
pub use scaler::StandardScaler;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
