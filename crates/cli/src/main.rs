//! Performance Insight CLI
//!
//! Runs the insight engine against metric snapshots and latency samples
//! on disk, and queries saved consensus reports.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, bottlenecks, latency, query, use_method};
use insight_lib::Severity;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Performance Insight CLI
#[derive(Parser)]
#[command(name = "pinsight")]
#[command(author, version, about = "CLI for the Performance Insight Engine", long_about = None)]
pub struct Cli {
    /// Engine config file (defaults to ~/.config/pinsight/config.toml when present)
    #[arg(long, short, env = "PINSIGHT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured source and print the consensus report
    Analyze {
        /// Metric snapshot (JSON)
        #[arg(long, short)]
        snapshot: PathBuf,

        /// Latency samples (JSON array or one value per line)
        #[arg(long, short)]
        latency: Option<PathBuf>,

        /// Insights from an external source (JSON array) to merge
        #[arg(long)]
        external: Option<PathBuf>,

        /// Name recorded for the external insights
        #[arg(long, default_value = "external")]
        external_name: String,

        /// Write the full report as JSON to this file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Dump engine metrics in Prometheus text format to stderr
        #[arg(long)]
        metrics: bool,
    },

    /// Score utilization, saturation and errors per resource
    Use {
        /// Metric snapshot (JSON)
        #[arg(long, short)]
        snapshot: PathBuf,
    },

    /// Summarize a latency distribution
    Latency {
        /// Latency samples (JSON array or one value per line)
        #[arg(long, short)]
        samples: PathBuf,

        /// Percentiles to report, comma separated
        #[arg(long, short, value_delimiter = ',')]
        percentiles: Option<Vec<f64>>,
    },

    /// Detect resource bottlenecks in a snapshot
    Bottlenecks {
        /// Metric snapshot (JSON)
        #[arg(long, short)]
        snapshot: PathBuf,
    },

    /// Filter insights from saved consensus reports
    Query {
        /// Consensus report files (JSON)
        #[arg(long, short, required = true, num_args = 1..)]
        report: Vec<PathBuf>,

        /// Only this severity (critical, high, medium, low, info)
        #[arg(long)]
        severity: Option<Severity>,

        /// Component substring, case-insensitive
        #[arg(long)]
        component: Option<String>,

        /// Exact source name
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of insights to show
        #[arg(long, short)]
        limit: Option<usize>,

        /// Show counts instead of insights
        #[arg(long)]
        summary: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let engine_config = config::load_engine_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            snapshot,
            latency,
            external,
            external_name,
            output,
            metrics,
        } => {
            let args = analyze::AnalyzeArgs {
                snapshot,
                latency,
                external,
                external_name,
                output,
                metrics,
            };
            analyze::run_analysis(&engine_config, args, cli.format).await?;
        }
        Commands::Use { snapshot } => {
            use_method::show_use_scores(&engine_config, &snapshot, cli.verbose, cli.format)
                .await?;
        }
        Commands::Latency {
            samples,
            percentiles,
        } => {
            latency::show_latency(&engine_config, &samples, percentiles, cli.format).await?;
        }
        Commands::Bottlenecks { snapshot } => {
            bottlenecks::show_bottlenecks(&engine_config, &snapshot, cli.format).await?;
        }
        Commands::Query {
            report,
            severity,
            component,
            source,
            limit,
            summary,
        } => {
            let filter = insight_lib::InsightFilter {
                severity,
                component,
                source,
                limit,
                ..Default::default()
            };
            query::query_reports(&report, filter, summary, cli.format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
