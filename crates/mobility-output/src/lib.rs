#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mobility-panel/mobility/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod export;
pub mod layout;
pub mod report;

pub use error::{ExportError, Result};
pub use export::{ExportFormat, read_frame, temp_path, write_atomic, write_frame, write_json};
pub use layout::ArtifactLayout;
pub use report::{RunReport, RunReportBuilder};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
