#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mobility-panel/mobility/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod error;
pub mod normalize;
pub mod panel;
pub mod reader;
pub mod record;

pub use aggregate::{AggregationConfig, CohortSums, MonthlyAggregate, StreamingAggregator};
pub use error::{DataError, Result};
pub use normalize::Normalizer;
pub use panel::{MonthlyPanel, MonthlyPanelRow, PANEL_COLUMNS, PanelBuilder, PanelMetric};
pub use reader::{ReadStats, RecordChunks, discover_csv_files};
pub use record::{DistrictKey, Month, RawRecord, StreamKind};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
