//! Monthly panel construction.
//!
//! The panel is a left-outer join anchored on the demographic aggregate:
//! every demographic `(district, month)` key yields exactly one row, and
//! biometric or enrolment sums are attached when present and left null when
//! not. Derived metrics:
//!
//! - `total_demo = student_updates + adult_updates`
//! - `student_ratio`, `adult_ratio` = share of `total_demo`, null when it is 0
//! - `movement_index = total_demo / pop_adult` when `pop_adult > 0`,
//!   otherwise `total_demo` itself. The two branches are on different
//!   scales; downstream consumers must keep that in mind.
//! - `month_index` = dense rank of the distinct months present, from 0

use crate::aggregate::MonthlyAggregate;
use crate::error::{DataError, Result};
use crate::record::{Month, StreamKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Column order of the persisted monthly panel.
pub const PANEL_COLUMNS: [&str; 18] = [
    "district_key",
    "state",
    "district",
    "month",
    "month_index",
    "month_num",
    "quarter",
    "student_updates",
    "adult_updates",
    "total_demo",
    "student_ratio",
    "adult_ratio",
    "bio_student",
    "bio_adult",
    "age_0_5",
    "age_5_17",
    "pop_adult",
    "movement_index",
];

/// Numeric panel metrics summarised per district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanelMetric {
    /// Student plus adult demographic updates
    TotalDemo,
    /// Student share of demographic updates
    StudentRatio,
    /// Adult share of demographic updates
    AdultRatio,
    /// Updates per adult enrolment, or raw updates without a population proxy
    MovementIndex,
    /// Student biometric updates
    BioStudent,
    /// Adult biometric updates
    BioAdult,
    /// Adult enrolments, the population proxy
    PopAdult,
}

impl PanelMetric {
    /// All metrics in column order.
    pub const fn all() -> [Self; 7] {
        [
            Self::TotalDemo,
            Self::StudentRatio,
            Self::AdultRatio,
            Self::MovementIndex,
            Self::BioStudent,
            Self::BioAdult,
            Self::PopAdult,
        ]
    }

    /// Panel column name.
    pub const fn column(&self) -> &'static str {
        match self {
            Self::TotalDemo => "total_demo",
            Self::StudentRatio => "student_ratio",
            Self::AdultRatio => "adult_ratio",
            Self::MovementIndex => "movement_index",
            Self::BioStudent => "bio_student",
            Self::BioAdult => "bio_adult",
            Self::PopAdult => "pop_adult",
        }
    }
}

/// One `(district, month)` row of the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPanelRow {
    /// Composite `STATE_DISTRICT` key
    pub district_key: String,
    /// Normalized state label
    pub state: String,
    /// Normalized district label
    pub district: String,
    /// Calendar month
    pub month: Month,
    /// Dense rank of `month` among all months present
    pub month_index: u32,
    /// Month of the year, 1-12
    pub month_num: u32,
    /// Quarter, 1-4
    pub quarter: u32,
    /// Demographic updates, ages 5-17
    pub student_updates: i64,
    /// Demographic updates, ages 17+
    pub adult_updates: i64,
    /// `student_updates + adult_updates`
    pub total_demo: i64,
    /// `student_updates / total_demo`
    pub student_ratio: Option<f64>,
    /// `adult_updates / total_demo`
    pub adult_ratio: Option<f64>,
    /// Biometric updates, ages 5-17
    pub bio_student: Option<i64>,
    /// Biometric updates, ages 17+
    pub bio_adult: Option<i64>,
    /// Enrolments, ages 0-5
    pub age_0_5: Option<i64>,
    /// Enrolments, ages 5-17
    pub age_5_17: Option<i64>,
    /// Enrolments, ages 18+
    pub pop_adult: Option<i64>,
    /// Mobility proxy
    pub movement_index: f64,
}

impl MonthlyPanelRow {
    /// Value of a metric as a float; `None` when null.
    pub fn metric(&self, metric: PanelMetric) -> Option<f64> {
        match metric {
            PanelMetric::TotalDemo => Some(self.total_demo as f64),
            PanelMetric::StudentRatio => self.student_ratio,
            PanelMetric::AdultRatio => self.adult_ratio,
            PanelMetric::MovementIndex => Some(self.movement_index),
            PanelMetric::BioStudent => self.bio_student.map(|v| v as f64),
            PanelMetric::BioAdult => self.bio_adult.map(|v| v as f64),
            PanelMetric::PopAdult => self.pop_adult.map(|v| v as f64),
        }
    }
}

/// `part / total`, null when `total` is zero.
pub fn ratio(part: i64, total: i64) -> Option<f64> {
    (total != 0).then(|| part as f64 / total as f64)
}

/// Movement index with the absolute-count fallback.
pub fn movement_index(total_demo: i64, pop_adult: Option<i64>) -> f64 {
    match pop_adult {
        Some(pop) if pop > 0 => total_demo as f64 / pop as f64,
        _ => total_demo as f64,
    }
}

/// The monthly panel: an immutable, ordered set of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyPanel {
    rows: Vec<MonthlyPanelRow>,
}

impl MonthlyPanel {
    /// Wrap rows as-is.
    pub const fn from_rows(rows: Vec<MonthlyPanelRow>) -> Self {
        Self { rows }
    }

    /// Rows in their current order.
    pub fn rows(&self) -> &[MonthlyPanelRow] {
        &self.rows
    }

    /// Take the rows.
    pub fn into_rows(self) -> Vec<MonthlyPanelRow> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct district keys.
    pub fn district_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.district_key.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Reorder by `(district_key, month_index)`, the order every per-district stage requires.
    pub fn sort_by_district_key(&mut self) {
        self.rows.sort_by(|a, b| {
            a.district_key
                .cmp(&b.district_key)
                .then(a.month_index.cmp(&b.month_index))
        });
    }

    /// Position of the first row that breaks strict `(district_key, month_index)` order.
    pub fn first_unsorted(&self) -> Option<usize> {
        self.rows
            .windows(2)
            .position(|w| {
                (w[0].district_key.as_str(), w[0].month_index)
                    >= (w[1].district_key.as_str(), w[1].month_index)
            })
            .map(|pos| pos + 1)
    }

    /// Whether rows are strictly ordered by `(district_key, month_index)`.
    pub fn is_sorted_by_district_key(&self) -> bool {
        self.first_unsorted().is_none()
    }

    /// Columnar form with [`PANEL_COLUMNS`].
    pub fn to_frame(&self) -> Result<DataFrame> {
        panel_frame(&self.rows)
    }

    /// Decode a frame written by [`Self::to_frame`].
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let district_key = str_column(df, "district_key")?;
        let state = str_column(df, "state")?;
        let district = str_column(df, "district")?;
        let month = str_column(df, "month")?;
        let month_indices = int_column(df, "month_index")?;
        let student_updates = int_column(df, "student_updates")?;
        let adult_updates = int_column(df, "adult_updates")?;
        let student_ratio = float_column(df, "student_ratio")?;
        let adult_ratio = float_column(df, "adult_ratio")?;
        let bio_student = int_column(df, "bio_student")?;
        let bio_adult = int_column(df, "bio_adult")?;
        let age_0_5 = int_column(df, "age_0_5")?;
        let age_5_17 = int_column(df, "age_5_17")?;
        let pop_adult = int_column(df, "pop_adult")?;
        let movement = float_column(df, "movement_index")?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let month = Month::parse(&month[i])
                .ok_or_else(|| DataError::InvalidPanel(format!("bad month '{}'", month[i])))?;
            let required = |values: &[Option<i64>], name: &str| {
                values[i].ok_or_else(|| DataError::InvalidPanel(format!("null {name} at row {i}")))
            };
            let student = required(&student_updates, "student_updates")?;
            let adult = required(&adult_updates, "adult_updates")?;
            let month_index = required(&month_indices, "month_index")?;

            rows.push(MonthlyPanelRow {
                district_key: district_key[i].clone(),
                state: state[i].clone(),
                district: district[i].clone(),
                month,
                month_index: u32::try_from(month_index)
                    .map_err(|_| DataError::InvalidPanel(format!("bad month_index at row {i}")))?,
                month_num: month.month_num(),
                quarter: month.quarter(),
                student_updates: student,
                adult_updates: adult,
                total_demo: student + adult,
                student_ratio: student_ratio[i],
                adult_ratio: adult_ratio[i],
                bio_student: bio_student[i],
                bio_adult: bio_adult[i],
                age_0_5: age_0_5[i],
                age_5_17: age_5_17[i],
                pop_adult: pop_adult[i],
                movement_index: movement[i].ok_or_else(|| {
                    DataError::InvalidPanel(format!("null movement_index at row {i}"))
                })?,
            });
        }

        Ok(Self { rows })
    }
}

/// Columnar form of any slice of panel rows.
pub fn panel_frame(rows: &[MonthlyPanelRow]) -> Result<DataFrame> {
    let strings = |f: fn(&MonthlyPanelRow) -> String| rows.iter().map(f).collect::<Vec<_>>();
    let ints = |f: fn(&MonthlyPanelRow) -> i64| rows.iter().map(f).collect::<Vec<_>>();
    let opt_ints = |f: fn(&MonthlyPanelRow) -> Option<i64>| rows.iter().map(f).collect::<Vec<_>>();
    let opt_floats =
        |f: fn(&MonthlyPanelRow) -> Option<f64>| rows.iter().map(f).collect::<Vec<_>>();

    let df = DataFrame::new(vec![
        Column::new("district_key".into(), strings(|r| r.district_key.clone())),
        Column::new("state".into(), strings(|r| r.state.clone())),
        Column::new("district".into(), strings(|r| r.district.clone())),
        Column::new("month".into(), strings(|r| r.month.to_string())),
        Column::new("month_index".into(), ints(|r| i64::from(r.month_index))),
        Column::new("month_num".into(), ints(|r| i64::from(r.month_num))),
        Column::new("quarter".into(), ints(|r| i64::from(r.quarter))),
        Column::new("student_updates".into(), ints(|r| r.student_updates)),
        Column::new("adult_updates".into(), ints(|r| r.adult_updates)),
        Column::new("total_demo".into(), ints(|r| r.total_demo)),
        Column::new("student_ratio".into(), opt_floats(|r| r.student_ratio)),
        Column::new("adult_ratio".into(), opt_floats(|r| r.adult_ratio)),
        Column::new("bio_student".into(), opt_ints(|r| r.bio_student)),
        Column::new("bio_adult".into(), opt_ints(|r| r.bio_adult)),
        Column::new("age_0_5".into(), opt_ints(|r| r.age_0_5)),
        Column::new("age_5_17".into(), opt_ints(|r| r.age_5_17)),
        Column::new("pop_adult".into(), opt_ints(|r| r.pop_adult)),
        Column::new(
            "movement_index".into(),
            rows.iter().map(|r| r.movement_index).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    df.column(name)?
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_string)
                .ok_or_else(|| DataError::InvalidPanel(format!("null {name} at row {i}")))
        })
        .collect()
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Joins the three stream aggregates into the monthly panel.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanelBuilder;

impl PanelBuilder {
    /// Create a builder.
    pub const fn new() -> Self {
        Self
    }

    /// Build the panel, sorted by `(state, district, month)`.
    pub fn build(
        &self,
        demographic: &MonthlyAggregate,
        biometric: &MonthlyAggregate,
        enrolment: &MonthlyAggregate,
    ) -> Result<MonthlyPanel> {
        expect_stream(demographic, StreamKind::Demographic)?;
        expect_stream(biometric, StreamKind::Biometric)?;
        expect_stream(enrolment, StreamKind::Enrolment)?;

        let month_index: BTreeMap<Month, u32> = demographic
            .iter()
            .map(|(_, month, _)| month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .zip(0..)
            .collect();

        let mut rows: Vec<_> = demographic
            .iter()
            .map(|(key, month, demo)| {
                let student = demo.get(0).unwrap_or(0);
                let adult = demo.get(1).unwrap_or(0);
                let total = student + adult;
                let bio = biometric.get(key, month);
                let enrol = enrolment.get(key, month);
                let pop_adult = enrol.and_then(|s| s.get(2));

                MonthlyPanelRow {
                    district_key: key.key(),
                    state: key.state().to_string(),
                    district: key.district().to_string(),
                    month,
                    month_index: month_index[&month],
                    month_num: month.month_num(),
                    quarter: month.quarter(),
                    student_updates: student,
                    adult_updates: adult,
                    total_demo: total,
                    student_ratio: ratio(student, total),
                    adult_ratio: ratio(adult, total),
                    bio_student: bio.and_then(|s| s.get(0)),
                    bio_adult: bio.and_then(|s| s.get(1)),
                    age_0_5: enrol.and_then(|s| s.get(0)),
                    age_5_17: enrol.and_then(|s| s.get(1)),
                    pop_adult,
                    movement_index: movement_index(total, pop_adult),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            (a.state.as_str(), a.district.as_str(), a.month)
                .cmp(&(b.state.as_str(), b.district.as_str(), b.month))
        });

        let fallback_rows = rows
            .iter()
            .filter(|r| !r.pop_adult.is_some_and(|p| p > 0))
            .count();
        info!(
            rows = rows.len(),
            districts = demographic.district_count(),
            months = month_index.len(),
            absolute_movement_rows = fallback_rows,
            "monthly panel built"
        );

        Ok(MonthlyPanel { rows })
    }
}

fn expect_stream(aggregate: &MonthlyAggregate, expected: StreamKind) -> Result<()> {
    if aggregate.stream() == expected {
        Ok(())
    } else {
        Err(DataError::StreamMismatch {
            expected: expected.name().to_string(),
            actual: aggregate.stream().name().to_string(),
        })
    }
}
