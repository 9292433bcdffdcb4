#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mobility-panel/mobility/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types from sub-crates
pub use mobility_data as data;
pub use mobility_features as features;
pub use mobility_model as model;
pub use mobility_output as output;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{AggregateSummary, ClusterSummary, Pipeline, StreamSummary};

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
