//! District feature engineering.
//!
//! Collapses each district's monthly history into one vector holding the
//! mean and sample standard deviation of every panel metric plus the trend
//! slopes of the student share and the movement index. Nulls are skipped
//! per metric; a metric with no observations yields a null mean.

use crate::error::{FeatureError, Result};
use crate::registry::{available_features, FeatureCategory, FeatureInfo};
use crate::trend::{trend_slope, TrendConfig};
use mobility_data::{MonthlyPanel, MonthlyPanelRow};
use polars::prelude::*;
use tracing::debug;

/// One district's feature vector, valued in [`available_features`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictFeatureVector {
    /// Composite `STATE_DISTRICT` key
    pub district_key: String,
    /// State label
    pub state: String,
    /// District label
    pub district: String,
    /// Number of panel months observed
    pub n_months: u32,
    values: Vec<Option<f64>>,
}

impl DistrictFeatureVector {
    /// Feature values in registry order.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Look up a feature by column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        available_features()
            .iter()
            .position(|f| f.name == name)
            .and_then(|i| self.values[i])
    }
}

/// Feature vectors for every district, ordered by district key.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictFeatures {
    vectors: Vec<DistrictFeatureVector>,
}

impl DistrictFeatures {
    /// Wrap precomputed vectors.
    pub const fn from_vectors(vectors: Vec<DistrictFeatureVector>) -> Self {
        Self { vectors }
    }

    /// Feature catalog describing each value slot.
    pub fn features(&self) -> Vec<FeatureInfo> {
        available_features()
    }

    /// All vectors.
    pub fn vectors(&self) -> &[DistrictFeatureVector] {
        &self.vectors
    }

    /// Number of districts.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether no district is present.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Keep only the vectors matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&DistrictFeatureVector) -> bool) {
        self.vectors.retain(keep);
    }

    /// Values of one feature across districts.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let index = available_features().iter().position(|f| f.name == name)?;
        Some(self.vectors.iter().map(|v| v.values[index]).collect())
    }

    /// Columnar form: identity columns, `n_months`, then one column per feature.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new(
                "district_key".into(),
                self.vectors.iter().map(|v| v.district_key.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "state".into(),
                self.vectors.iter().map(|v| v.state.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "district".into(),
                self.vectors.iter().map(|v| v.district.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "n_months".into(),
                self.vectors.iter().map(|v| i64::from(v.n_months)).collect::<Vec<_>>(),
            ),
        ];
        for (index, info) in available_features().iter().enumerate() {
            columns.push(Column::new(
                info.name.into(),
                self.vectors.iter().map(|v| v.values[index]).collect::<Vec<_>>(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Computes [`DistrictFeatures`] from a sorted panel.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    trend: TrendConfig,
}

impl FeatureEngineer {
    /// Create an engineer with the given trend settings.
    pub const fn new(trend: TrendConfig) -> Self {
        Self { trend }
    }

    /// One vector per district key.
    ///
    /// The panel must be strictly ordered by `(district_key, month_index)`,
    /// and every row of a district must carry the same state and district
    /// labels.
    pub fn compute(&self, panel: &MonthlyPanel) -> Result<DistrictFeatures> {
        crate::ensure_sorted(panel, "feature engineering")?;
        let features = available_features();

        let vectors = panel
            .rows()
            .chunk_by(|a, b| a.district_key == b.district_key)
            .map(|group| self.district_vector(group, &features))
            .collect::<Result<Vec<_>>>()?;

        debug!(districts = vectors.len(), features = features.len(), "district features computed");
        Ok(DistrictFeatures { vectors })
    }

    fn district_vector(
        &self,
        group: &[MonthlyPanelRow],
        features: &[FeatureInfo],
    ) -> Result<DistrictFeatureVector> {
        let first = &group[0];
        if let Some(bad) = group
            .iter()
            .find(|r| r.state != first.state || r.district != first.district)
        {
            return Err(FeatureError::InconsistentLabels {
                district_key: first.district_key.clone(),
                expected: format!("{}/{}", first.state, first.district),
                found: format!("{}/{}", bad.state, bad.district),
            });
        }

        let values = features
            .iter()
            .map(|info| {
                let points: Vec<(f64, f64)> = group
                    .iter()
                    .filter_map(|r| r.metric(info.metric).map(|y| (f64::from(r.month_index), y)))
                    .collect();
                match info.category {
                    FeatureCategory::Mean => mean(&points),
                    FeatureCategory::Std => sample_std(&points),
                    FeatureCategory::Slope => Some(trend_slope(&points, &self.trend)),
                }
            })
            .collect();

        Ok(DistrictFeatureVector {
            district_key: first.district_key.clone(),
            state: first.state.clone(),
            district: first.district.clone(),
            n_months: group.len() as u32,
            values,
        })
    }
}

fn mean(points: &[(f64, f64)]) -> Option<f64> {
    (!points.is_empty()).then(|| points.iter().map(|(_, y)| y).sum::<f64>() / points.len() as f64)
}

// Sample (n - 1) deviation; null below two observations.
fn sample_std(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let m = mean(points)?;
    let ss: f64 = points.iter().map(|(_, y)| (y - m).powi(2)).sum();
    Some((ss / (points.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::row;
    use approx::assert_relative_eq;

    #[test]
    fn test_six_month_history() {
        let totals = [10, 12, 9, 15, 11, 14];
        let rows = totals
            .iter()
            .enumerate()
            .map(|(i, &t)| row("KERALA", "IDUKKI", i as u32, t, Some(100)))
            .collect();
        let features = FeatureEngineer::default()
            .compute(&MonthlyPanel::from_rows(rows))
            .unwrap();

        assert_eq!(features.len(), 1);
        let v = &features.vectors()[0];
        assert_eq!(v.n_months, 6);
        assert_relative_eq!(v.get("mean_total_demo").unwrap(), 71.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(v.get("mean_movement_index").unwrap(), 0.71 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(v.get("mean_pop_adult").unwrap(), 100.0, epsilon = 1e-12);
        assert_relative_eq!(
            v.get("std_total_demo").unwrap(),
            (161.0_f64 / 30.0).sqrt(),
            epsilon = 1e-12
        );
        // dispersion is only tracked for volume, student share and movement
        assert!(v.get("std_pop_adult").is_none());
        assert!(v.get("mean_bio_student").is_none());

        // least squares over x = 0..5 of totals / 100
        let slope = v.get("slope_movement_index").unwrap();
        assert_relative_eq!(slope, 0.0065714285714286, epsilon = 1e-9);
    }

    #[test]
    fn test_single_month_district() {
        let panel = MonthlyPanel::from_rows(vec![row("S", "A", 0, 10, Some(50))]);
        let v = FeatureEngineer::default().compute(&panel).unwrap().vectors()[0].clone();
        assert_eq!(v.n_months, 1);
        assert!(v.get("std_total_demo").is_none());
        assert_eq!(v.get("slope_student_ratio"), Some(0.0));
        assert_eq!(v.get("slope_movement_index"), Some(0.0));
    }

    #[test]
    fn test_constant_ratio_is_flat() {
        let rows = (0..4).map(|i| row("S", "A", i, 20, None)).collect();
        let features = FeatureEngineer::default()
            .compute(&MonthlyPanel::from_rows(rows))
            .unwrap();
        assert_relative_eq!(
            features.vectors()[0].get("slope_student_ratio").unwrap(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_adjacent_districts_do_not_mix() {
        let rows = vec![
            row("S", "A", 0, 10, None),
            row("S", "A", 1, 20, None),
            row("S", "B", 0, 1000, None),
            row("S", "B", 1, 1000, None),
        ];
        let features = FeatureEngineer::default()
            .compute(&MonthlyPanel::from_rows(rows))
            .unwrap();
        assert_eq!(features.len(), 2);
        assert_relative_eq!(features.vectors()[0].get("mean_total_demo").unwrap(), 15.0);
        assert_relative_eq!(features.vectors()[1].get("mean_total_demo").unwrap(), 1000.0);
        assert_relative_eq!(features.vectors()[1].get("slope_movement_index").unwrap(), 0.0);
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let rows = vec![row("S", "B", 0, 1, None), row("S", "A", 0, 1, None)];
        let err = FeatureEngineer::default()
            .compute(&MonthlyPanel::from_rows(rows))
            .unwrap_err();
        assert!(matches!(err, FeatureError::UnsortedInput { row: 1, .. }));
    }

    #[test]
    fn test_inconsistent_labels_rejected() {
        let mut second = row("S", "A", 1, 1, None);
        second.district = "OTHER".to_string();
        let rows = vec![row("S", "A", 0, 1, None), second];
        let err = FeatureEngineer::default()
            .compute(&MonthlyPanel::from_rows(rows))
            .unwrap_err();
        assert!(matches!(err, FeatureError::InconsistentLabels { .. }));
    }

    #[test]
    fn test_frame_columns() {
        let panel = MonthlyPanel::from_rows(vec![row("S", "A", 0, 10, Some(50))]);
        let df = FeatureEngineer::default().compute(&panel).unwrap().to_frame().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 4 + available_features().len());
    }
}
