//! Linear trend estimation.
//!
//! The slope of `y` against `x` by ordinary least squares. With fewer than
//! the configured number of points, or no spread in `x`, the slope is
//! exactly 0: a flat trend, not a missing value.

use serde::{Deserialize, Serialize};

/// Configuration for trend slopes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Minimum non-null observations for a fitted slope (default: 2)
    pub min_points: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { min_points: 2 }
    }
}

/// Least-squares slope, or `None` with fewer than two points or constant `x`.
pub fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    (sxx > 0.0).then(|| sxy / sxx)
}

/// Slope with the degenerate-case rule applied.
pub fn trend_slope(points: &[(f64, f64)], config: &TrendConfig) -> f64 {
    if points.len() < config.min_points.max(2) {
        return 0.0;
    }
    least_squares_slope(points).unwrap_or(0.0)
}
