//! Model capability traits.
//!
//! The pipeline talks to its learners only through these seams, so any
//! implementation with the same contract can be swapped in.

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Supervised regression.
pub trait Regressor {
    /// Fitted state produced by [`Regressor::fit`]
    type Model;

    /// Fit to rows of `x` and targets `y`.
    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Model>;

    /// Predict one value per row of `x`.
    fn predict(&self, model: &Self::Model, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Relative importance of each input column, when the model reports it.
    fn feature_importances(&self, model: &Self::Model) -> Option<Array1<f64>> {
        let _ = model;
        None
    }
}

/// Column-wise rescaling.
pub trait Scaler {
    /// Learn the scaling from `x` and apply it.
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Dimensionality reduction.
pub trait Reducer {
    /// Learn the projection from `x` and return the projected rows.
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Output dimensionality.
    fn n_components(&self) -> usize;
}

/// Unsupervised partitioning.
pub trait Partitioner {
    /// Assign every row of `x` a partition id in `0..n_partitions`.
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Vec<usize>>;

    /// Number of partitions.
    fn n_partitions(&self) -> usize;
}
