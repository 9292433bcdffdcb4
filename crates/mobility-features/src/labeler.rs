//! Leakage-safe forecast labels.
//!
//! A pair joins an observed row with the metrics of the same district
//! `horizon` observations later. The shift is positional within the
//! district's group, so a district with `n` observed months yields
//! `n - horizon` pairs whether or not its months are contiguous, and the
//! lookup never leaves the group.

use crate::error::{FeatureError, Result};
use mobility_data::panel::panel_frame;
use mobility_data::{MonthlyPanel, MonthlyPanelRow};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for forecast labels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Months ahead of the observed row (default: 3)
    pub horizon: u32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self { horizon: 3 }
    }
}

/// One supervised example.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPair {
    /// Observed row at `t`
    pub row: MonthlyPanelRow,
    /// `movement_index` at `t + horizon`
    pub movement_target: f64,
    /// `student_ratio` at `t + horizon`
    pub student_target: f64,
}

/// Supervised pairs in panel order.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPairs {
    horizon: u32,
    pairs: Vec<ForecastPair>,
}

impl ForecastPairs {
    /// Horizon the pairs were built with.
    pub const fn horizon(&self) -> u32 {
        self.horizon
    }

    /// All pairs.
    pub fn pairs(&self) -> &[ForecastPair] {
        &self.pairs
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair could be formed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Movement targets in pair order.
    pub fn movement_targets(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.movement_target).collect()
    }

    /// Student-share targets in pair order.
    pub fn student_targets(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.student_target).collect()
    }

    /// Panel columns followed by `movement_target` and `student_target`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows: Vec<MonthlyPanelRow> = self.pairs.iter().map(|p| p.row.clone()).collect();
        let mut df = panel_frame(&rows)?;
        df.with_column(Column::new("movement_target".into(), self.movement_targets()))?;
        df.with_column(Column::new("student_target".into(), self.student_targets()))?;
        Ok(df)
    }
}

/// Builds forecast pairs and the forward snapshot.
#[derive(Debug, Clone)]
pub struct ForecastLabeler {
    horizon: u32,
}

impl Default for ForecastLabeler {
    fn default() -> Self {
        Self {
            horizon: LabelConfig::default().horizon,
        }
    }
}

impl ForecastLabeler {
    /// Create a labeler. A zero horizon would label rows with themselves.
    pub fn new(config: &LabelConfig) -> Result<Self> {
        if config.horizon == 0 {
            return Err(FeatureError::InvalidHorizon(config.horizon));
        }
        Ok(Self {
            horizon: config.horizon,
        })
    }

    /// Months ahead of the observed row.
    pub const fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Pairs for every row with a non-null target `horizon` rows later in its district.
    pub fn label(&self, panel: &MonthlyPanel) -> Result<ForecastPairs> {
        crate::ensure_sorted(panel, "forecast labeling")?;

        let shift = self.horizon as usize;
        let mut pairs = Vec::new();
        for group in panel.rows().chunk_by(|a, b| a.district_key == b.district_key) {
            for (row, target) in group.iter().zip(group.iter().skip(shift)) {
                if let Some(student_target) = target.student_ratio {
                    pairs.push(ForecastPair {
                        row: row.clone(),
                        movement_target: target.movement_index,
                        student_target,
                    });
                }
            }
        }

        debug!(
            rows = panel.len(),
            pairs = pairs.len(),
            horizon = self.horizon,
            "forecast pairs labeled"
        );
        Ok(ForecastPairs {
            horizon: self.horizon,
            pairs,
        })
    }

    /// Each district's row at its last observed month, in district order.
    pub fn snapshot(&self, panel: &MonthlyPanel) -> Result<MonthlyPanel> {
        crate::ensure_sorted(panel, "forecast snapshot")?;
        let rows = panel
            .rows()
            .chunk_by(|a, b| a.district_key == b.district_key)
            .filter_map(|group| group.last().cloned())
            .collect();
        Ok(MonthlyPanel::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::row;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn contiguous(district: &str, totals: &[i64]) -> Vec<MonthlyPanelRow> {
        totals
            .iter()
            .enumerate()
            .map(|(i, &t)| row("S", district, i as u32, t, Some(100)))
            .collect()
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(3, 0)]
    #[case(4, 1)]
    #[case(6, 3)]
    #[case(12, 9)]
    fn test_trailing_window_drop(#[case] months: usize, #[case] expected: usize) {
        let totals: Vec<i64> = (1..=months as i64).map(|t| t * 10).collect();
        let panel = MonthlyPanel::from_rows(contiguous("A", &totals));
        let pairs = ForecastLabeler::default().label(&panel).unwrap();
        assert_eq!(pairs.len(), expected);
    }

    #[test]
    fn test_scenario_targets_match_future_month() {
        let panel = MonthlyPanel::from_rows(contiguous("A", &[10, 12, 9, 15, 11, 14]));
        let pairs = ForecastLabeler::default().label(&panel).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_relative_eq!(pairs.pairs()[0].movement_target, 0.15, epsilon = 1e-12);
        for pair in pairs.pairs() {
            let future = &panel.rows()[(pair.row.month_index + 3) as usize];
            assert_eq!(pair.movement_target, future.movement_index);
            assert_eq!(Some(pair.student_target), future.student_ratio);
        }
    }

    #[test]
    fn test_targets_never_cross_districts() {
        let mut rows = contiguous("A", &[10, 20]);
        rows.extend(contiguous("B", &[1000, 2000, 3000, 4000, 5000]));
        let panel = MonthlyPanel::from_rows(rows);
        let pairs = ForecastLabeler::default().label(&panel).unwrap();

        assert_eq!(pairs.len(), 2);
        assert!(pairs.pairs().iter().all(|p| p.row.district == "B"));
        assert_relative_eq!(pairs.pairs()[0].movement_target, 40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gapped_history_drops_only_trailing_window() {
        // month 3 is missing for this district but present elsewhere in the panel
        let indices = [0, 1, 2, 4, 5, 6];
        let rows: Vec<_> = indices
            .iter()
            .map(|&i| row("S", "A", i, 10 * (i as i64 + 1), Some(10)))
            .collect();
        let pairs = ForecastLabeler::default()
            .label(&MonthlyPanel::from_rows(rows))
            .unwrap();

        assert_eq!(pairs.len(), indices.len() - 3);
        let observed: Vec<_> = pairs.pairs().iter().map(|p| p.row.month_index).collect();
        assert_eq!(observed, vec![0, 1, 2]);
        // third observation after month 0 is month 4
        assert_relative_eq!(pairs.pairs()[0].movement_target, 5.0, epsilon = 1e-12);
        assert_relative_eq!(pairs.pairs()[2].movement_target, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_null_student_target_drops_pair() {
        let rows = vec![row("S", "A", 0, 10, Some(10)), row("S", "A", 1, 0, Some(10))];
        let labeler = ForecastLabeler::new(&LabelConfig { horizon: 1 }).unwrap();
        assert!(labeler.label(&MonthlyPanel::from_rows(rows)).unwrap().is_empty());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let err = ForecastLabeler::new(&LabelConfig { horizon: 0 }).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidHorizon(0)));
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let rows = vec![row("S", "A", 1, 10, None), row("S", "A", 0, 10, None)];
        let err = ForecastLabeler::default()
            .label(&MonthlyPanel::from_rows(rows))
            .unwrap_err();
        assert!(matches!(err, FeatureError::UnsortedInput { .. }));
    }

    #[test]
    fn test_snapshot_takes_last_month_per_district() {
        let mut rows = contiguous("A", &[10, 20, 30]);
        rows.extend(contiguous("B", &[5]));
        let snapshot = ForecastLabeler::default()
            .snapshot(&MonthlyPanel::from_rows(rows))
            .unwrap();
        let last: Vec<_> = snapshot
            .rows()
            .iter()
            .map(|r| (r.district.as_str(), r.month_index))
            .collect();
        assert_eq!(last, vec![("A", 2), ("B", 0)]);
    }

    #[test]
    fn test_frame_appends_target_columns() {
        let panel = MonthlyPanel::from_rows(contiguous("A", &[10, 12, 9, 15]));
        let df = ForecastLabeler::default().label(&panel).unwrap().to_frame().unwrap();
        assert_eq!(df.height(), 1);
        assert!(df.column("movement_target").is_ok());
        assert!(df.column("student_target").is_ok());
    }
}
