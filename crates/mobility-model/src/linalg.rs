//! Dense linear algebra helpers
//!
//! Symmetric eigendecomposition by cyclic Jacobi sweeps, column centering,
//! covariance and numerical rank. Every matrix here is a feature-by-feature
//! covariance or Gram matrix, so `n` is the feature count.

use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2, Axis};
use tracing::warn;

/// Sweep limit of the Jacobi iteration.
pub const MAX_SWEEPS: usize = 64;

/// Off-diagonal mass, relative to the whole matrix, at which a sweep stops.
const OFF_DIAGONAL_TOL: f64 = 1e-24;

/// Eigenpairs of a symmetric matrix
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues, largest first
    pub values: Array1<f64>,
    /// Unit eigenvectors as columns, aligned with `values`
    pub vectors: Array2<f64>,
}

/// Decompose a symmetric matrix with cyclic Jacobi sweeps.
///
/// Every sweep rotates each upper-triangle pair once, in row order, until the
/// squared off-diagonal norm drops below a relative tolerance. Symmetry is
/// not checked.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<SymmetricEigen> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(ModelError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let total: f64 = a.iter().map(|x| x * x).sum();

    let mut converged = false;
    for _ in 0..MAX_SWEEPS {
        if off_diagonal_sq(&a) <= OFF_DIAGONAL_TOL * total {
            converged = true;
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                rotate(&mut a, &mut v, p, q);
            }
        }
    }
    if !converged {
        warn!(size = n, sweeps = MAX_SWEEPS, "jacobi sweeps exhausted");
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));
    Ok(SymmetricEigen {
        values: order.iter().map(|&i| a[[i, i]]).collect(),
        vectors: v.select(Axis(1), &order),
    })
}

fn off_diagonal_sq(a: &Array2<f64>) -> f64 {
    a.indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(_, x)| x * x)
        .sum()
}

// Annihilates a[p][q] and accumulates the rotation into v.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let apq = a[[p, q]];
    if apq == 0.0 {
        return;
    }
    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
    let c = 1.0 / t.hypot(1.0);
    let s = t * c;
    let tau = s / (1.0 + c);

    a[[p, p]] -= t * apq;
    a[[q, q]] += t * apq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for k in (0..a.nrows()).filter(|&k| k != p && k != q) {
        let (akp, akq) = (a[[k, p]], a[[k, q]]);
        a[[k, p]] = akp - s * (akq + tau * akp);
        a[[k, q]] = akq + s * (akp - tau * akq);
        a[[p, k]] = a[[k, p]];
        a[[q, k]] = a[[k, q]];
    }
    for mut row in v.rows_mut() {
        let (vp, vq) = (row[p], row[q]);
        row[p] = vp - s * (vq + tau * vp);
        row[q] = vq + s * (vp - tau * vq);
    }
}

/// Column means; zeros for an empty matrix.
pub fn column_means(x: &Array2<f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

/// Subtract column means.
pub fn center(x: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
    let means = column_means(x);
    (x - &means, means)
}

/// Sample covariance of the columns (`n - 1` denominator, floored at 1).
pub fn covariance(x: &Array2<f64>) -> Array2<f64> {
    let (centered, _) = center(x);
    let denom = x.nrows().saturating_sub(1).max(1) as f64;
    centered.t().dot(&centered) / denom
}

/// Number of eigenvalues of the centered Gram matrix above a relative
/// tolerance. Zero when every column is constant.
pub fn numerical_rank(x: &Array2<f64>) -> Result<usize> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Ok(0);
    }
    let (centered, _) = center(x);
    let gram = centered.t().dot(&centered);
    let scale = gram.diag().iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    if scale == 0.0 {
        return Ok(0);
    }

    let threshold = scale * 1e-10 * x.nrows().max(x.ncols()) as f64;
    let eigen = symmetric_eigen(&gram)?;
    Ok(eigen.values.iter().filter(|&&v| v > threshold).count())
}
