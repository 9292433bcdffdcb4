//! Core record types shared by every pipeline stage.
//!
//! A [`DistrictKey`] is the canonical identity of a district across all three
//! input streams, a [`Month`] is the aggregation period, and a [`RawRecord`]
//! is one normalized row of a raw update log.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, returning `None` unless `month` is in `1..=12`.
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if month >= 1 && month <= 12 {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Month containing the given date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse the `YYYY-MM` form produced by `Display`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    /// Calendar year.
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month of the year, 1-12.
    pub const fn month_num(&self) -> u32 {
        self.month
    }

    /// Quarter of the year, 1-4.
    pub const fn quarter(&self) -> u32 {
        (self.month - 1) / 3 + 1
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Canonical `(state, district)` identity.
///
/// Both labels are trimmed and upper-cased on construction, so the same
/// real-world district read from different streams yields equal keys.
/// Ordering is by state, then district.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DistrictKey {
    state: String,
    district: String,
}

impl DistrictKey {
    /// Build a key from raw labels.
    pub fn new(state: &str, district: &str) -> Self {
        Self {
            state: normalize_label(state),
            district: normalize_label(district),
        }
    }

    /// Normalized state label.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Normalized district label.
    pub fn district(&self) -> &str {
        &self.district
    }

    /// Composite key, `STATE_DISTRICT`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.state, self.district)
    }
}

impl fmt::Display for DistrictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.state, self.district)
    }
}

/// Trim and upper-case an identifier label.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// One raw cohort column and the panel column it is summed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cohort {
    /// Column name in the raw CSV files
    pub raw: &'static str,
    /// Column name in the monthly panel
    pub column: &'static str,
}

const DEMOGRAPHIC_COHORTS: &[Cohort] = &[
    Cohort {
        raw: "demo_age_5_17",
        column: "student_updates",
    },
    Cohort {
        raw: "demo_age_17_",
        column: "adult_updates",
    },
];

const BIOMETRIC_COHORTS: &[Cohort] = &[
    Cohort {
        raw: "bio_age_5_17",
        column: "bio_student",
    },
    Cohort {
        raw: "bio_age_17_",
        column: "bio_adult",
    },
];

const ENROLMENT_COHORTS: &[Cohort] = &[
    Cohort {
        raw: "age_0_5",
        column: "age_0_5",
    },
    Cohort {
        raw: "age_5_17",
        column: "age_5_17",
    },
    Cohort {
        raw: "age_18_greater",
        column: "pop_adult",
    },
];

/// The three raw update logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Demographic updates, the primary mobility signal
    Demographic,
    /// Biometric updates, a lifecycle signal
    Biometric,
    /// New enrolments, used as the population proxy
    Enrolment,
}

impl StreamKind {
    /// All streams in join order.
    pub const fn all() -> [Self; 3] {
        [Self::Demographic, Self::Biometric, Self::Enrolment]
    }

    /// Lower-case stream name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Demographic => "demographic",
            Self::Biometric => "biometric",
            Self::Enrolment => "enrolment",
        }
    }

    /// Directory holding this stream's CSV chunks under the raw root.
    pub const fn directory_name(&self) -> &'static str {
        match self {
            Self::Demographic => "api_data_aadhar_demographic",
            Self::Biometric => "api_data_aadhar_biometric",
            Self::Enrolment => "api_data_aadhar_enrolment",
        }
    }

    /// Cohort counters carried by this stream, in accumulator order.
    pub const fn cohorts(&self) -> &'static [Cohort] {
        match self {
            Self::Demographic => DEMOGRAPHIC_COHORTS,
            Self::Biometric => BIOMETRIC_COHORTS,
            Self::Enrolment => ENROLMENT_COHORTS,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One normalized row of a raw update log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Canonical district identity
    pub district: DistrictKey,
    /// Postal code, kept as text
    pub pincode: Option<String>,
    /// Record date; `None` when the raw value did not parse
    pub date: Option<NaiveDate>,
    /// Cohort counters in [`StreamKind::cohorts`] order; `None` when not numeric
    pub cohorts: Vec<Option<i64>>,
}

impl RawRecord {
    /// Aggregation month, if the date parsed.
    pub fn month(&self) -> Option<Month> {
        self.date.map(Month::from_date)
    }
}
