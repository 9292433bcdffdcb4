//! Random forest regression
//!
//! Bootstrap-aggregated CART trees. Each tree draws its bootstrap sample and
//! candidate features from its own `StdRng`, seeded from the forest seed and
//! the tree's position, so a fit is reproducible for a fixed seed.
//!
//! Splits minimise the summed squared error of the two children. Feature
//! importances are the impurity decrease attributed to each feature,
//! normalised per tree and averaged over the forest.

use crate::capability::Regressor;
use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees (default: 400)
    pub n_trees: usize,
    /// Maximum tree depth (default: 12)
    pub max_depth: usize,
    /// Minimum samples required to split a node (default: 5)
    pub min_samples_split: usize,
    /// Features considered per split; all when `None`
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree (default: true)
    pub bootstrap: bool,
    /// Random seed (default: 42)
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 400,
            max_depth: 12,
            min_samples_split: 5,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Predict a single row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf; 0 for a single leaf.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// A fitted forest
#[derive(Debug, Clone, PartialEq)]
pub struct ForestModel {
    trees: Vec<RegressionTree>,
    n_features: usize,
    importances: Array1<f64>,
}

impl ForestModel {
    /// Fitted trees.
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Number of input columns.
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Impurity-based importances, summing to 1 unless no split was made.
    pub const fn importances(&self) -> &Array1<f64> {
        &self.importances
    }
}

/// Random forest regressor
#[derive(Debug, Clone, Default)]
pub struct RandomForestRegressor {
    config: ForestConfig,
}

impl RandomForestRegressor {
    /// Create a regressor.
    pub const fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Hyperparameters.
    pub const fn config(&self) -> &ForestConfig {
        &self.config
    }

    fn validate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.nrows() != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if self.config.n_trees == 0 {
            return Err(ModelError::InvalidParameter("n_trees must be positive".into()));
        }
        if self.config.max_features == Some(0) {
            return Err(ModelError::InvalidParameter("max_features must be positive".into()));
        }
        Ok(())
    }
}

impl Regressor for RandomForestRegressor {
    type Model = ForestModel;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ForestModel> {
        self.validate(x, y)?;
        let n_features = x.ncols();
        let mut importances = Array1::<f64>::zeros(n_features);

        let trees: Vec<RegressionTree> = (0..self.config.n_trees)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(t as u64));
                let n = x.nrows();
                let samples: Vec<usize> = if self.config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };

                let mut builder = TreeBuilder {
                    x,
                    y,
                    config: &self.config,
                    rng,
                    nodes: Vec::new(),
                    importances: Array1::zeros(n_features),
                };
                builder.grow(samples, 0);

                let total = builder.importances.sum();
                if total > 0.0 {
                    importances += &(&builder.importances / total);
                }
                RegressionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }

        debug!(
            trees = trees.len(),
            rows = x.nrows(),
            features = n_features,
            "random forest fitted"
        );
        Ok(ForestModel {
            trees,
            n_features,
            importances,
        })
    }

    fn predict(&self, model: &ForestModel, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != model.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: model.n_features,
                actual: x.ncols(),
            });
        }
        let n_trees = model.trees.len() as f64;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| model.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn feature_importances(&self, model: &ForestModel) -> Option<Array1<f64>> {
        Some(model.importances.clone())
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    config: &'a ForestConfig,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Array1<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    // Samples sorted by the split feature, and the size of the left side.
    ordered: Vec<usize>,
    n_left: usize,
    decrease: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `samples`; returns its node index.
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let index = self.nodes.len();
        let value = samples.iter().map(|&i| self.y[i]).sum::<f64>() / samples.len() as f64;
        self.nodes.push(Node::Leaf { value });

        if depth >= self.config.max_depth || samples.len() < self.config.min_samples_split {
            return index;
        }
        let Some(split) = self.best_split(&samples) else {
            return index;
        };

        self.importances[split.feature] += split.decrease;
        let BestSplit {
            feature,
            threshold,
            mut ordered,
            n_left,
            ..
        } = split;
        let right_samples = ordered.split_off(n_left);
        let left = self.grow(ordered, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n = self.x.ncols();
        match self.config.max_features {
            Some(k) if k < n => {
                let mut features = sample(&mut self.rng, n, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n).collect(),
        }
    }

    fn best_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let n = samples.len() as f64;
        let total: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = samples.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total * total / n;
        if parent_sse <= 1e-12 * total_sq.max(1.0) {
            return None;
        }

        let mut best: Option<BestSplit> = None;
        for feature in self.candidate_features() {
            let mut ordered = samples.to_vec();
            ordered.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let mut best_here: Option<(usize, f64, f64)> = None;
            for pos in 0..ordered.len() - 1 {
                let yi = self.y[ordered[pos]];
                left_sum += yi;
                left_sq += yi * yi;

                let here = self.x[[ordered[pos], feature]];
                let next = self.x[[ordered[pos + 1], feature]];
                if here == next {
                    continue;
                }
                let n_left = (pos + 1) as f64;
                let n_right = n - n_left;
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);
                let decrease = parent_sse - sse;

                if best_here.is_none_or(|(_, _, d)| decrease > d) {
                    best_here = Some((pos + 1, (here + next) / 2.0, decrease));
                }
            }

            if let Some((n_left, threshold, decrease)) = best_here {
                if decrease > 0.0 && best.as_ref().is_none_or(|b| decrease > b.decrease) {
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        ordered,
                        n_left,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        // y depends on column 0 only; column 1 is noise
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 { i as f64 } else { ((i * 7) % 11) as f64 }
        });
        let y = Array1::from_shape_fn(n, |i| if i < 20 { 1.0 } else { 5.0 });
        (x, y)
    }

    fn small_forest(seed: u64) -> RandomForestRegressor {
        RandomForestRegressor::new(ForestConfig {
            n_trees: 25,
            seed,
            ..Default::default()
        })
    }

    #[test]
    fn test_fits_step_function() {
        let (x, y) = step_data();
        let forest = small_forest(42);
        let model = forest.fit(&x, &y).unwrap();
        let pred = forest.predict(&model, &array![[2.0, 0.0], [35.0, 0.0]]).unwrap();
        assert_relative_eq!(pred[0], 1.0, epsilon = 0.5);
        assert_relative_eq!(pred[1], 5.0, epsilon = 0.5);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = step_data();
        let a = small_forest(7).fit(&x, &y).unwrap();
        let b = small_forest(7).fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_favor_signal_column() {
        let (x, y) = step_data();
        let forest = small_forest(42);
        let model = forest.fit(&x, &y).unwrap();
        let importances = forest.feature_importances(&model).unwrap();
        assert_relative_eq!(importances.sum(), 1.0, epsilon = 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_depth_limit() {
        let (x, _) = step_data();
        let y = Array1::from_shape_fn(x.nrows(), |i| i as f64);
        let forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 3,
            max_depth: 2,
            min_samples_split: 2,
            ..Default::default()
        });
        let model = forest.fit(&x, &y).unwrap();
        assert!(model.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let (x, _) = step_data();
        let y = Array1::from_elem(x.nrows(), 3.0);
        let forest = small_forest(1);
        let model = forest.fit(&x, &y).unwrap();
        assert!(model.trees().iter().all(|t| t.node_count() == 1));
        assert_eq!(model.importances().sum(), 0.0);
    }

    #[test]
    fn test_empty_training_set() {
        let x = Array2::<f64>::zeros((0, 3));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(
            RandomForestRegressor::default().fit(&x, &y),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let (x, y) = step_data();
        let forest = small_forest(3);
        let model = forest.fit(&x, &y).unwrap();
        assert!(matches!(
            forest.predict(&model, &Array2::zeros((1, 3))),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }
}
