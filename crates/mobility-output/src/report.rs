//! Run report.
//!
//! A JSON document summarising one pipeline invocation. Each phase adds a
//! named section; sections are kept in name order so reports diff cleanly.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Report for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Crate version that produced the report.
    pub version: String,

    /// Report generation timestamp.
    pub generated_at: DateTime<Utc>,

    /// Phases that ran, in order.
    pub phases: Vec<String>,

    /// Per-phase sections.
    pub sections: BTreeMap<String, serde_json::Value>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            generated_at: Utc::now(),
            phases: Vec::new(),
            sections: BTreeMap::new(),
        }
    }

    /// Section by name.
    pub fn section(&self, name: &str) -> Option<&serde_json::Value> {
        self.sections.get(name)
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct RunReportBuilder {
    version: Option<String>,
    phases: Vec<String>,
    sections: BTreeMap<String, serde_json::Value>,
}

impl RunReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the producing version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Record a phase and its section.
    pub fn phase<T: Serialize>(mut self, name: &str, section: &T) -> Result<Self> {
        self.phases.push(name.to_string());
        self.sections
            .insert(name.to_string(), serde_json::to_value(section)?);
        Ok(self)
    }

    /// Build the report.
    pub fn build(self) -> RunReport {
        let mut report = RunReport::new(self.version.unwrap_or_default());
        report.phases = self.phases;
        report.sections = self.sections;
        report
    }
}
