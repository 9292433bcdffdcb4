//! K-means with k-means++ seeding.
//!
//! Lloyd iterations until the summed squared centroid shift drops below
//! `tol` times the mean per-column variance of the data. Ties go to the
//! lowest centroid index, and an emptied cluster keeps its previous center.

use crate::capability::Partitioner;
use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// K-means parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Number of clusters (default: 4)
    pub n_clusters: usize,
    /// Maximum Lloyd iterations per run (default: 300)
    pub max_iter: usize,
    /// Relative convergence tolerance (default: 1e-4)
    pub tol: f64,
    /// Independent seedings; the lowest-inertia run wins (default: 1)
    pub n_init: usize,
    /// Random seed (default: 42)
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            max_iter: 300,
            tol: 1e-4,
            n_init: 1,
            seed: 42,
        }
    }
}

/// K-means partitioner
#[derive(Debug, Clone, Default)]
pub struct KMeans {
    config: KMeansConfig,
    centroids: Option<Array2<f64>>,
    inertia: Option<f64>,
}

impl KMeans {
    /// Create an unfitted partitioner.
    pub const fn new(config: KMeansConfig) -> Self {
        Self {
            config,
            centroids: None,
            inertia: None,
        }
    }

    /// Final centroids, one row per cluster.
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    /// Summed squared distance of points to their centroid.
    pub fn inertia(&self) -> Option<f64> {
        self.inertia
    }

    fn run(&self, x: &Array2<f64>, rng: &mut StdRng, tol: f64) -> (Array2<f64>, Vec<usize>, f64) {
        let k = self.config.n_clusters;
        let mut centroids = kmeans_plus_plus(x, k, rng);
        let mut labels = assign(x, &centroids);

        for iteration in 0..self.config.max_iter {
            let updated = recompute(x, &labels, &centroids);
            let shift: f64 = (&updated - &centroids).mapv(|v| v * v).sum();
            centroids = updated;
            labels = assign(x, &centroids);
            if shift <= tol {
                debug!(iteration, shift, "k-means converged");
                break;
            }
        }

        let inertia = x
            .rows()
            .into_iter()
            .zip(&labels)
            .map(|(row, &c)| squared_distance(row, centroids.row(c)))
            .sum();
        (centroids, labels, inertia)
    }
}

impl Partitioner for KMeans {
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let k = self.config.n_clusters;
        if k == 0 {
            return Err(ModelError::InvalidParameter("n_clusters must be positive".into()));
        }
        if x.nrows() < k {
            return Err(ModelError::InsufficientSamples {
                required: k,
                actual: x.nrows(),
            });
        }

        let mean_variance = x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
        let tol = self.config.tol * mean_variance;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut best: Option<(Array2<f64>, Vec<usize>, f64)> = None;
        for _ in 0..self.config.n_init.max(1) {
            let run = self.run(x, &mut rng, tol);
            if best.as_ref().is_none_or(|b| run.2 < b.2) {
                best = Some(run);
            }
        }
        let Some((centroids, labels, inertia)) = best else {
            return Err(ModelError::NotFitted);
        };

        self.centroids = Some(centroids);
        self.inertia = Some(inertia);
        Ok(labels)
    }

    fn n_partitions(&self) -> usize {
        self.config.n_clusters
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(row: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids
        .rows()
        .into_iter()
        .enumerate()
        .map(|(c, centroid)| (c, squared_distance(row, centroid)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn kmeans_plus_plus(x: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let mut centroids = Array2::<f64>::zeros((k, x.ncols()));
    centroids.row_mut(0).assign(&x.row(rng.gen_range(0..n)));
    let mut closest: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        // All points coincide with a chosen center: fall back to uniform.
        let next = match WeightedIndex::new(closest.iter().copied()) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.gen_range(0..n),
        };
        centroids.row_mut(c).assign(&x.row(next));
        for (i, row) in x.rows().into_iter().enumerate() {
            closest[i] = closest[i].min(squared_distance(row, centroids.row(c)));
        }
    }
    centroids
}

fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    x.rows()
        .into_iter()
        .map(|row| nearest(row, centroids).0)
        .collect()
}

fn recompute(x: &Array2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.dim());
    let mut counts = vec![0usize; previous.nrows()];
    for (row, &c) in x.rows().into_iter().zip(labels) {
        let mut target = sums.row_mut(c);
        target += &row;
        counts[c] += 1;
    }
    for (c, &count) in counts.iter().enumerate() {
        if count == 0 {
            sums.row_mut(c).assign(&previous.row(c));
        } else {
            sums.row_mut(c).mapv_inplace(|v| v / count as f64);
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        let centers = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)];
        let offsets = [(0.1, 0.2), (-0.2, 0.1), (0.15, -0.1), (-0.05, -0.2), (0.0, 0.05)];
        let mut x = Array2::zeros((centers.len() * offsets.len(), 2));
        for (c, (cx, cy)) in centers.iter().enumerate() {
            for (o, (dx, dy)) in offsets.iter().enumerate() {
                let i = c * offsets.len() + o;
                x[[i, 0]] = cx + dx;
                x[[i, 1]] = cy + dy;
            }
        }
        x
    }

    #[test]
    fn test_recovers_separated_blobs() {
        let x = blobs();
        let mut kmeans = KMeans::new(KMeansConfig {
            n_init: 10,
            ..Default::default()
        });
        let labels = kmeans.fit_predict(&x).unwrap();
        for blob in labels.chunks(5) {
            assert!(blob.iter().all(|&l| l == blob[0]));
        }
        let mut distinct: Vec<_> = labels.chunks(5).map(|b| b[0]).collect();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let x = blobs();
        let a = KMeans::default().fit_predict(&x).unwrap();
        let b = KMeans::default().fit_predict(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fewer_samples_than_clusters() {
        let x = array![[0.0], [1.0], [2.0]];
        assert!(matches!(
            KMeans::default().fit_predict(&x),
            Err(ModelError::InsufficientSamples { required: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_identical_points() {
        let x = Array2::from_elem((6, 2), 1.5);
        let mut kmeans = KMeans::default();
        let labels = kmeans.fit_predict(&x).unwrap();
        assert_eq!(labels.len(), 6);
        assert_eq!(kmeans.inertia(), Some(0.0));
    }
}
