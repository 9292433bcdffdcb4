//! Mobility CLI binary.
//!
//! Runs the aggregate, forecast and cluster phases from the command line.

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mobility::model::ForecastMetrics;
use mobility::output::ExportFormat;
use mobility::{AggregateSummary, ClusterSummary, Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mobility")]
#[command(about = "District mobility panel: aggregation, forecasting and clustering", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON configuration file; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output root for artifacts
    #[arg(long, global = true, default_value = "data/processed")]
    out: PathBuf,

    /// Frame format (parquet or csv), overriding the config file
    #[arg(long, global = true)]
    format: Option<ExportFormat>,

    /// Print phase summaries as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate raw update logs into the monthly panel
    Aggregate {
        /// Raw root holding one directory per stream
        #[arg(long, default_value = "data/raw")]
        raw: PathBuf,
    },

    /// Forecast movement and student share from the monthly panel
    Forecast {
        /// Months ahead, overriding the config file
        #[arg(long)]
        horizon: Option<u32>,
    },

    /// Cluster districts into archetypes from the monthly panel
    Cluster {
        /// Number of clusters, overriding the config file
        #[arg(long)]
        clusters: Option<usize>,
    },

    /// Run every phase and write the run report
    Run {
        /// Raw root holding one directory per stream
        #[arg(long, default_value = "data/raw")]
        raw: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.global.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(format) = cli.global.format {
        config.format = format;
    }

    match cli.command {
        Commands::Aggregate { raw } => {
            let pipeline = Pipeline::new(config, cli.global.out.clone());
            let summary = aggregate_with_progress(&pipeline, &raw)?;
            emit(&summary, cli.global.json, print_aggregate)?;
        }
        Commands::Forecast { horizon } => {
            if let Some(horizon) = horizon {
                config.forecast.labels.horizon = horizon;
            }
            let pipeline = Pipeline::new(config, cli.global.out.clone());
            let metrics = pipeline.forecast()?;
            emit(&metrics, cli.global.json, print_forecast)?;
        }
        Commands::Cluster { clusters } => {
            if let Some(clusters) = clusters {
                config.cluster.kmeans.n_clusters = clusters;
            }
            let pipeline = Pipeline::new(config, cli.global.out.clone());
            let summary = pipeline.cluster()?;
            emit(&summary, cli.global.json, print_cluster)?;
        }
        Commands::Run { raw } => {
            let pipeline = Pipeline::new(config, cli.global.out.clone());
            let pb = file_progress(&pipeline, &raw)?;
            let report = pipeline.run_all(&raw, |stream, _| {
                pb.set_message(stream.to_string());
                pb.inc(1);
            })?;
            pb.finish_with_message("aggregated");
            if cli.global.json {
                println!("{}", report.to_json()?);
            } else {
                println!(
                    "\nRun complete: {} phase(s), report at {}",
                    report.phases.len(),
                    pipeline.layout().report().display()
                );
            }
        }
        Commands::Config => {
            println!("{}", config.to_json()?);
        }
    }

    Ok(())
}

fn file_progress(pipeline: &Pipeline, raw: &Path) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let total: usize = pipeline
        .discover(raw)?
        .iter()
        .map(|(_, files)| files.len())
        .sum();
    info!(files = total, raw = %raw.display(), "raw inputs discovered");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("aggregating");
    Ok(pb)
}

fn aggregate_with_progress(
    pipeline: &Pipeline,
    raw: &Path,
) -> Result<AggregateSummary, Box<dyn std::error::Error>> {
    let pb = file_progress(pipeline, raw)?;
    let result = pipeline.aggregate(raw, |stream, _| {
        pb.set_message(stream.to_string());
        pb.inc(1);
    });
    match result {
        Ok(summary) => {
            pb.finish_with_message(format!("{} panel rows", summary.panel_rows));
            Ok(summary)
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            Err(e.into())
        }
    }
}

fn emit<T: serde::Serialize>(
    value: &T,
    json: bool,
    print: fn(&T),
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

fn print_aggregate(summary: &AggregateSummary) {
    println!("\nMonthly panel");
    println!("=============\n");
    for stream in &summary.streams {
        println!(
            "  {:12} {:4} file(s) {:8} rows {:6} districts",
            stream.stream.name(),
            stream.files,
            stream.stats.rows,
            stream.districts
        );
        if stream.stats.invalid_dates > 0 || stream.stats.invalid_counts > 0 {
            println!(
                "  {:12} {} unparseable date(s), {} non-numeric count(s)",
                "",
                stream.stats.invalid_dates,
                stream.stats.invalid_counts
            );
        }
    }
    println!(
        "\n  Rows: {}  Districts: {}  Months: {}",
        summary.panel_rows, summary.districts, summary.months
    );
}

fn print_forecast(metrics: &ForecastMetrics) {
    println!("\nForecast ({} month horizon)", metrics.horizon);
    println!("===========================\n");
    println!("  Training rows:     {}", metrics.training_rows);
    println!("  Forecast districts: {}", metrics.forecast_districts);
    println!("  Movement RMSE:     {:.6}", metrics.movement_rmse);
    println!("  Student RMSE:      {:.6}", metrics.student_rmse);

    println!("\n  Movement importances:");
    for fi in &metrics.movement_importances {
        println!("    {:20} {:.4}", fi.feature, fi.importance);
    }
    println!("\n  Student-share importances:");
    for fi in &metrics.student_importances {
        println!("    {:20} {:.4}", fi.feature, fi.importance);
    }
}

fn print_cluster(summary: &ClusterSummary) {
    println!("\nDistrict archetypes");
    println!("===================\n");
    println!(
        "  Clustered {} of {} districts into {} state group(s)\n",
        summary.clustered_districts, summary.input_districts, summary.hierarchy_groups
    );
    for (label, size) in &summary.cluster_sizes {
        println!("  {label:25} {size:5}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mobility", "forecast", "--horizon", "6", "--format", "csv", "--out", "/tmp/m",
        ])
        .unwrap();
        assert_eq!(cli.global.format, Some(ExportFormat::Csv));
        assert_eq!(cli.global.out, PathBuf::from("/tmp/m"));
        assert!(matches!(cli.command, Commands::Forecast { horizon: Some(6) }));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["mobility", "cluster", "--format", "xlsx"]).is_err());
    }
}
