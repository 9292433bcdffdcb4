//! Phase orchestration
//!
//! Every phase computes its frames in full before the first write, and each
//! artifact is written atomically, so a failed phase leaves the previous
//! artifacts untouched.

use crate::config::PipelineConfig;
use crate::error::Result;
use mobility_data::{
    MonthlyAggregate, MonthlyPanel, PanelBuilder, ReadStats, StreamKind, StreamingAggregator,
    discover_csv_files,
};
use mobility_features::FeatureEngineer;
use mobility_model::{ClusterEmbedder, ForecastMetrics, Forecaster};
use mobility_output::{ArtifactLayout, RunReport, RunReportBuilder, read_frame, write_frame, write_json};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

/// Panel columns read back as text from CSV artifacts.
pub const PANEL_TEXT_COLUMNS: [&str; 4] = ["district_key", "state", "district", "month"];

/// Joins hierarchy districts in formats without list columns.
pub const HIERARCHY_SEPARATOR: &str = ";";

/// What one raw stream contributed.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    /// Stream name
    pub stream: StreamKind,
    /// CSV files read
    pub files: usize,
    /// Distinct districts
    pub districts: usize,
    /// Distinct `(district, month)` keys
    pub keys: usize,
    /// Rows read and values coerced to missing
    pub stats: ReadStats,
}

/// Result of the aggregate phase.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    /// Per-stream breakdown, in join order
    pub streams: Vec<StreamSummary>,
    /// Monthly panel rows
    pub panel_rows: usize,
    /// Districts in the panel
    pub districts: usize,
    /// Length of the dense month axis
    pub months: usize,
}

/// Result of the cluster phase.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    /// Districts with features
    pub input_districts: usize,
    /// Districts that passed the filter and were clustered
    pub clustered_districts: usize,
    /// Districts per cluster label
    pub cluster_sizes: BTreeMap<String, usize>,
    /// `(state, cluster_label)` groups in the hierarchy
    pub hierarchy_groups: usize,
}

/// Runs the pipeline phases against one artifact layout.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    layout: ArtifactLayout,
}

impl Pipeline {
    /// Create a pipeline writing under `output_root` in the configured format.
    pub fn new(config: PipelineConfig, output_root: impl Into<PathBuf>) -> Self {
        let layout = ArtifactLayout::new(output_root, config.format);
        Self { config, layout }
    }

    /// Active configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Artifact paths.
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// CSV inputs per stream under `raw_root`, in join order.
    ///
    /// Fails on the first stream directory without CSV files.
    pub fn discover(&self, raw_root: &Path) -> Result<Vec<(StreamKind, Vec<PathBuf>)>> {
        StreamKind::all()
            .into_iter()
            .map(|stream| {
                let files = discover_csv_files(&raw_root.join(stream.directory_name()))?;
                Ok((stream, files))
            })
            .collect()
    }

    /// Aggregate the raw logs into the monthly panel artifact.
    ///
    /// `on_file` is called once per finished file, possibly from worker threads.
    pub fn aggregate<F>(&self, raw_root: &Path, on_file: F) -> Result<AggregateSummary>
    where
        F: Fn(StreamKind, &Path) + Sync,
    {
        let inputs = self.discover(raw_root)?;
        let aggregator = StreamingAggregator::new(self.config.aggregation.clone());

        let mut aggregates: HashMap<StreamKind, MonthlyAggregate> = HashMap::new();
        let mut streams = Vec::with_capacity(inputs.len());
        for (stream, files) in &inputs {
            let stream = *stream;
            let (aggregate, stats) =
                aggregator.aggregate_files_with_stats(stream, files, |path| on_file(stream, path))?;
            streams.push(StreamSummary {
                stream,
                files: files.len(),
                districts: aggregate.district_count(),
                keys: aggregate.len(),
                stats,
            });
            aggregates.insert(stream, aggregate);
        }

        let mut take = |stream: StreamKind| {
            aggregates
                .remove(&stream)
                .unwrap_or_else(|| MonthlyAggregate::new(stream))
        };
        let panel = PanelBuilder::new().build(
            &take(StreamKind::Demographic),
            &take(StreamKind::Biometric),
            &take(StreamKind::Enrolment),
        )?;

        let summary = AggregateSummary {
            streams,
            panel_rows: panel.len(),
            districts: panel.district_count(),
            months: panel
                .rows()
                .iter()
                .map(|r| r.month_index as usize + 1)
                .max()
                .unwrap_or(0),
        };

        let mut frame = panel.to_frame()?;
        self.write(&self.layout.monthly_panel(), &mut frame)?;
        info!(
            rows = summary.panel_rows,
            districts = summary.districts,
            months = summary.months,
            "aggregate phase complete"
        );
        Ok(summary)
    }

    /// Read the monthly panel artifact.
    pub fn load_panel(&self) -> Result<MonthlyPanel> {
        let df = read_frame(&self.layout.monthly_panel(), &PANEL_TEXT_COLUMNS)?;
        Ok(MonthlyPanel::from_frame(&df)?)
    }

    /// Fit the forecasters on the panel artifact and write both prediction frames.
    pub fn forecast(&self) -> Result<ForecastMetrics> {
        let panel = self.load_panel()?;
        let mut output = Forecaster::new(self.config.forecast.clone()).run(&panel)?;

        self.write(&self.layout.historical_predictions(), &mut output.historical)?;
        self.write(&self.layout.future_forecast(), &mut output.future)?;
        info!(
            horizon = output.metrics.horizon,
            training_rows = output.metrics.training_rows,
            "forecast phase complete"
        );
        Ok(output.metrics)
    }

    /// Cluster districts from the panel artifact and write features, embedding and hierarchy.
    pub fn cluster(&self) -> Result<ClusterSummary> {
        let mut panel = self.load_panel()?;
        panel.sort_by_district_key();

        let features = FeatureEngineer::new(self.config.trend.clone()).compute(&panel)?;
        let input_districts = features.len();
        let result = ClusterEmbedder::new(self.config.cluster.clone()).fit(features)?;

        let mut features_frame = result.features_frame()?;
        let mut embedding_frame = result.embedding_frame()?;
        let mut hierarchy_frame = if self.layout.format().supports_lists() {
            result.hierarchy_frame()?
        } else {
            result.hierarchy_frame_flat(HIERARCHY_SEPARATOR)?
        };

        let summary = ClusterSummary {
            input_districts,
            clustered_districts: result.features().len(),
            cluster_sizes: result.cluster_sizes(),
            hierarchy_groups: hierarchy_frame.height(),
        };

        self.write(&self.layout.district_features(), &mut features_frame)?;
        self.write(&self.layout.pca_embedding(), &mut embedding_frame)?;
        self.write(&self.layout.hierarchy(), &mut hierarchy_frame)?;
        info!(
            districts = summary.clustered_districts,
            groups = summary.hierarchy_groups,
            "cluster phase complete"
        );
        Ok(summary)
    }

    /// Run every phase in order and write the run report.
    pub fn run_all<F>(&self, raw_root: &Path, on_file: F) -> Result<RunReport>
    where
        F: Fn(StreamKind, &Path) + Sync,
    {
        let aggregate = self.aggregate(raw_root, on_file)?;
        let forecast = self.forecast()?;
        let cluster = self.cluster()?;

        let report = RunReportBuilder::new()
            .version(crate::VERSION)
            .phase("config", &self.config)?
            .phase("aggregate", &aggregate)?
            .phase("forecast", &forecast)?
            .phase("cluster", &cluster)?
            .build();
        self.write_report(&report)?;
        Ok(report)
    }

    /// Write `report.json`.
    pub fn write_report(&self, report: &RunReport) -> Result<()> {
        write_json(&self.layout.report(), report)?;
        Ok(())
    }

    fn write(&self, path: &Path, df: &mut DataFrame) -> Result<()> {
        write_frame(path, df, self.layout.format())?;
        Ok(())
    }
}
