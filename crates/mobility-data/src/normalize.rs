//! Row normalization.
//!
//! Resolves the column layout of a CSV header once, then turns each row into
//! a [`RawRecord`]. Bad values never fail a row: unparseable dates and
//! non-numeric counters become `None`.

use crate::error::{DataError, Result};
use crate::record::{DistrictKey, RawRecord, StreamKind};
use chrono::NaiveDate;
use csv::StringRecord;
use std::path::Path;

/// Date format used by the raw update logs.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Column layout of one CSV source for one stream.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stream: StreamKind,
    date: usize,
    state: usize,
    district: usize,
    pincode: Option<usize>,
    cohorts: Vec<usize>,
}

impl Normalizer {
    /// Resolve column positions from a header row.
    ///
    /// `source` only labels the error when a required column is absent.
    pub fn from_headers(stream: StreamKind, headers: &StringRecord, source: &Path) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| DataError::MissingColumn {
                column: name.to_string(),
                stream: stream.name().to_string(),
                path: source.to_path_buf(),
            })
        };

        let cohorts = stream
            .cohorts()
            .iter()
            .map(|cohort| require(cohort.raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            stream,
            date: require("date")?,
            state: require("state")?,
            district: require("district")?,
            pincode: find("pincode"),
            cohorts,
        })
    }

    /// Stream this layout belongs to.
    pub const fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Normalize one row.
    pub fn normalize(&self, row: &StringRecord) -> RawRecord {
        let field = |idx: usize| row.get(idx).unwrap_or("");

        RawRecord {
            district: DistrictKey::new(field(self.state), field(self.district)),
            pincode: self
                .pincode
                .map(|idx| field(idx).trim().to_string())
                .filter(|p| !p.is_empty()),
            date: parse_date(field(self.date)),
            cohorts: self.cohorts.iter().map(|&idx| parse_count(field(idx))).collect(),
        }
    }
}

/// Parse a `dd-mm-YYYY` date; anything else is missing.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Parse a cohort counter.
///
/// Integers and integral floats (`"12.0"`, `"1e3"`) are accepted; empty,
/// fractional, non-finite or non-numeric values are missing.
pub fn parse_count(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}
