//! District clustering
//!
//! Filters district features, standardizes the mean, std and slope columns
//! (nulls as 0), embeds them in two principal components and partitions the
//! standardized space with seeded k-means. Cluster ids map to fixed
//! semantic labels and are rolled up into a state hierarchy.
//!
//! K-means ids carry no intrinsic meaning: a different input can permute
//! them, and the label table would then name the wrong group.

use crate::capability::{Partitioner, Reducer, Scaler};
use crate::error::{ModelError, Result};
use crate::kmeans::{KMeans, KMeansConfig};
use crate::pca::Pca;
use crate::scaler::StandardScaler;
use mobility_features::{
    BalancedFilter, BalancedFilterConfig, DistrictFeatures, clustering_feature_names,
};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Label for clusters outside the fixed table.
pub const UNKNOWN_LABEL: &str = "Unknown";

const CLUSTER_LABELS: [&str; 4] = [
    "Metro Absorption Hubs",
    "Student Migration Hubs",
    "Economic Origin Belts",
    "Stable Districts",
];

/// Semantic label for a cluster id.
pub fn semantic_label(cluster: usize) -> &'static str {
    CLUSTER_LABELS.get(cluster).copied().unwrap_or(UNKNOWN_LABEL)
}

/// Clustering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Pre-clustering filter
    pub filter: BalancedFilterConfig,
    /// Partitioning parameters
    pub kmeans: KMeansConfig,
    /// Embedding dimensionality (default: 2)
    pub n_components: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            filter: BalancedFilterConfig::default(),
            kmeans: KMeansConfig::default(),
            n_components: 2,
        }
    }
}

/// Districts sharing a state and cluster label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    /// State label
    pub state: String,
    /// Cluster label
    pub cluster_label: String,
    /// District labels, sorted
    pub districts: Vec<String>,
}

/// Output of [`ClusterEmbedder::fit`].
#[derive(Debug, Clone)]
pub struct ClusterResult {
    features: DistrictFeatures,
    assignments: Vec<usize>,
    embedding: Array2<f64>,
}

impl ClusterResult {
    /// Features of the districts that passed the filter.
    pub const fn features(&self) -> &DistrictFeatures {
        &self.features
    }

    /// Cluster id per district, aligned with [`Self::features`].
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    /// Embedding rows, aligned with [`Self::features`].
    pub const fn embedding(&self) -> &Array2<f64> {
        &self.embedding
    }

    /// Districts per cluster label, in label order.
    pub fn cluster_sizes(&self) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        for &c in &self.assignments {
            *sizes.entry(semantic_label(c).to_string()).or_insert(0) += 1;
        }
        sizes
    }

    /// District features plus `cluster` and `cluster_label`.
    pub fn features_frame(&self) -> Result<DataFrame> {
        let mut df = self.features.to_frame()?;
        df.with_column(Column::new(
            "cluster".into(),
            self.assignments.iter().map(|&c| c as i64).collect::<Vec<_>>(),
        ))?;
        df.with_column(Column::new(
            "cluster_label".into(),
            self.assignments
                .iter()
                .map(|&c| semantic_label(c))
                .collect::<Vec<_>>(),
        ))?;
        Ok(df)
    }

    /// `district_key` plus one `pca_<n>` column per component.
    pub fn embedding_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![Column::new(
            "district_key".into(),
            self.features
                .vectors()
                .iter()
                .map(|v| v.district_key.clone())
                .collect::<Vec<_>>(),
        )];
        for (j, component) in self.embedding.columns().into_iter().enumerate() {
            columns.push(Column::new(
                format!("pca_{}", j + 1).into(),
                component.to_vec(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Districts grouped by `(state, cluster_label)`, ordered by state, label, district.
    pub fn hierarchy(&self) -> Vec<HierarchyEntry> {
        let mut groups: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for (vector, &c) in self.features.vectors().iter().zip(&self.assignments) {
            groups
                .entry((vector.state.clone(), semantic_label(c).to_string()))
                .or_default()
                .push(vector.district.clone());
        }
        groups
            .into_iter()
            .map(|((state, cluster_label), mut districts)| {
                districts.sort();
                HierarchyEntry {
                    state,
                    cluster_label,
                    districts,
                }
            })
            .collect()
    }

    /// Hierarchy with a list-typed `district` column.
    pub fn hierarchy_frame(&self) -> Result<DataFrame> {
        let entries = self.hierarchy();
        let lists: Vec<Series> = entries
            .iter()
            .map(|e| Series::new(PlSmallStr::EMPTY, e.districts.clone()))
            .collect();
        Ok(DataFrame::new(vec![
            Column::new(
                "state".into(),
                entries.iter().map(|e| e.state.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "cluster_label".into(),
                entries.iter().map(|e| e.cluster_label.clone()).collect::<Vec<_>>(),
            ),
            Column::new("district".into(), lists),
        ])?)
    }

    /// Hierarchy with districts joined by `separator`, for formats without lists.
    pub fn hierarchy_frame_flat(&self, separator: &str) -> Result<DataFrame> {
        let entries = self.hierarchy();
        Ok(DataFrame::new(vec![
            Column::new(
                "state".into(),
                entries.iter().map(|e| e.state.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "cluster_label".into(),
                entries.iter().map(|e| e.cluster_label.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "district".into(),
                entries
                    .iter()
                    .map(|e| e.districts.join(separator))
                    .collect::<Vec<_>>(),
            ),
        ])?)
    }
}

/// Filters, standardizes, embeds and partitions district features.
#[derive(Debug, Clone, Default)]
pub struct ClusterEmbedder {
    config: ClusterConfig,
}

impl ClusterEmbedder {
    /// Create an embedder.
    pub const fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Standardized clustering inputs, one row per district.
    pub fn standardized_inputs(features: &DistrictFeatures) -> Result<Array2<f64>> {
        let names = clustering_feature_names();
        let mut x = Array2::<f64>::zeros((features.len(), names.len()));
        for (j, name) in names.iter().enumerate() {
            let column = features
                .column(name)
                .ok_or_else(|| ModelError::MissingColumn((*name).to_string()))?;
            for (i, value) in column.into_iter().enumerate() {
                x[[i, j]] = value.unwrap_or(0.0);
            }
        }
        StandardScaler::new().fit_transform(&x)
    }

    /// Cluster the districts that pass the filter.
    pub fn fit(&self, features: DistrictFeatures) -> Result<ClusterResult> {
        let features = BalancedFilter::new(self.config.filter.clone()).apply(features);
        let k = self.config.kmeans.n_clusters;
        if features.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.len() < k {
            return Err(ModelError::InsufficientSamples {
                required: k,
                actual: features.len(),
            });
        }

        let x = Self::standardized_inputs(&features)?;
        let embedding = Pca::new(self.config.n_components).fit_transform(&x)?;
        let assignments = KMeans::new(self.config.kmeans.clone()).fit_predict(&x)?;

        if k > CLUSTER_LABELS.len() {
            warn!(
                clusters = k,
                labelled = CLUSTER_LABELS.len(),
                "clusters beyond the label table are reported as {UNKNOWN_LABEL}"
            );
        }
        warn!("cluster labels follow k-means id order; a changed input can permute them");

        let result = ClusterResult {
            features,
            assignments,
            embedding,
        };
        info!(
            districts = result.features.len(),
            clusters = k,
            sizes = ?result.cluster_sizes(),
            "districts clustered"
        );
        Ok(result)
    }
}
