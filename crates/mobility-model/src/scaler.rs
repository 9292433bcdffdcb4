//! Standard scaling.

use crate::capability::Scaler;
use crate::error::{ModelError, Result};
use crate::linalg::column_means;
use ndarray::{Array1, Array2, Axis};

/// Zero mean and unit population variance per column. A constant column
/// is centered and left unscaled.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    means: Option<Array1<f64>>,
    scales: Option<Array1<f64>>,
}

impl StandardScaler {
    /// Create an unfitted scaler.
    pub const fn new() -> Self {
        Self {
            means: None,
            scales: None,
        }
    }

    /// Learn column means and scales.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        let means = column_means(x);
        let std = x.std_axis(Axis(0), 0.0);
        let scales = std
            .iter()
            .zip(means.iter())
            .map(|(&s, &m)| if s > 1e-12 * m.abs().max(1.0) { s } else { 1.0 })
            .collect();
        self.means = Some(means);
        self.scales = Some(scales);
        Ok(())
    }

    /// Apply the learned scaling.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(means), Some(scales)) = (&self.means, &self.scales) else {
            return Err(ModelError::NotFitted);
        };
        if x.ncols() != means.len() {
            return Err(ModelError::DimensionMismatch {
                expected: means.len(),
                actual: x.ncols(),
            });
        }
        Ok((x - means) / scales)
    }

    /// Learned column means.
    pub fn means(&self) -> Option<&Array1<f64>> {
        self.means.as_ref()
    }

    /// Learned column scales.
    pub fn scales(&self) -> Option<&Array1<f64>> {
        self.scales.as_ref()
    }
}

impl Scaler for StandardScaler {
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
