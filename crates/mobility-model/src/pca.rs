//! Principal component analysis
//!
//! Components are the leading eigenvectors of the sample covariance matrix.
//! Each component's sign is fixed so that its largest-magnitude loading is
//! positive, which makes the embedding reproducible.

use crate::capability::Reducer;
use crate::error::{ModelError, Result};
use crate::linalg::{center, covariance, symmetric_eigen};
use ndarray::{Array1, Array2, s};

/// PCA projection
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    mean: Option<Array1<f64>>,
    components: Option<Array2<f64>>,
    explained_variance: Option<Array1<f64>>,
}

impl Default for Pca {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Pca {
    /// Create an unfitted projection onto `n_components` dimensions.
    pub const fn new(n_components: usize) -> Self {
        Self {
            n_components,
            mean: None,
            components: None,
            explained_variance: None,
        }
    }

    /// Learn the components of `x`.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if self.n_components == 0 || self.n_components > x.ncols() {
            return Err(ModelError::InvalidParameter(format!(
                "n_components {} must be in 1..={}",
                self.n_components,
                x.ncols()
            )));
        }

        let decomp = symmetric_eigen(&covariance(x))?;

        let mut components = decomp
            .vectors
            .slice(s![.., ..self.n_components])
            .t()
            .to_owned();
        for mut row in components.rows_mut() {
            let pivot = row
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                row.mapv_inplace(|v| -v);
            }
        }

        self.mean = Some(center(x).1);
        self.components = Some(components);
        self.explained_variance = Some(
            decomp
                .values
                .slice(s![..self.n_components])
                .mapv(|v| v.max(0.0)),
        );
        Ok(())
    }

    /// Project rows onto the learned components.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(mean), Some(components)) = (&self.mean, &self.components) else {
            return Err(ModelError::NotFitted);
        };
        if x.ncols() != mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: mean.len(),
                actual: x.ncols(),
            });
        }
        Ok((x - mean).dot(&components.t()))
    }

    /// Component loadings, one row per component.
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.components.as_ref()
    }

    /// Variance captured by each component.
    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.explained_variance.as_ref()
    }
}

impl Reducer for Pca {
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn n_components(&self) -> usize {
        self.n_components
    }
}
