//! Full engine analysis command

use anyhow::{Context, Result};
use insight_lib::engine::external_contribution;
use insight_lib::{
    AnalysisInput, ConsensusReport, EngineConfig, EngineMetrics, Insight, PerformanceEngine,
    SourceStatus,
};
use std::path::PathBuf;
use tabled::Tabled;

use super::{insight_rows, load_samples, load_snapshot, print_list};
use crate::output::{
    color_score, color_severity, color_status, print_info, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

pub struct AnalyzeArgs {
    pub snapshot: PathBuf,
    pub latency: Option<PathBuf>,
    pub external: Option<PathBuf>,
    pub external_name: String,
    pub output: Option<PathBuf>,
    pub metrics: bool,
}

/// Row for the per-source table
#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "Source")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Insights")]
    insights: usize,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Row for the severity breakdown
#[derive(Tabled)]
struct SeverityRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Count")]
    count: usize,
}

/// Run every configured source over the inputs and print the consensus report
pub async fn run_analysis(
    config: &EngineConfig,
    args: AnalyzeArgs,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = load_snapshot(config, &args.snapshot).await?;
    let mut input = AnalysisInput::new(snapshot);
    if let Some(path) = &args.latency {
        input = input.with_latency_samples(load_samples(path).await?);
    }

    let mut external = Vec::new();
    if let Some(path) = &args.external {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let insights: Vec<Insight> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse insights from {}", path.display()))?;
        external.push(external_contribution(args.external_name.clone(), insights));
    }

    let engine = PerformanceEngine::from_config(config)?;
    let report = engine.analyze_with(input, external).await;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    match format {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => print_json(&report)?,
    }

    if let Some(path) = &args.output {
        if format == OutputFormat::Table {
            print_success(&format!("Report written to {}", path.display()));
        }
    }

    if args.metrics {
        eprint!("{}", EngineMetrics::new().gather_text());
    }

    Ok(())
}

fn print_report(report: &ConsensusReport) {
    print_info(&format!(
        "Session {} | consensus score {}",
        report.session_id,
        color_score(report.consensus_score)
    ));

    let sources: Vec<SourceRow> = report
        .sources
        .iter()
        .map(|s| SourceRow {
            name: s.name.clone(),
            status: color_status(&s.status.to_string()),
            insights: s.insight_count,
            reason: s.reason.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    print_table(&sources);

    if report.insights.is_empty() {
        print_success("No performance issues detected");
    } else {
        let severities: Vec<SeverityRow> = report
            .counts_by_severity
            .iter()
            .rev()
            .filter(|(_, count)| **count > 0)
            .map(|(severity, count)| SeverityRow {
                severity: color_severity(*severity),
                count: *count,
            })
            .collect();
        print_table(&severities);
        print_table(&insight_rows(&report.insights));
    }

    let failed = report
        .sources
        .iter()
        .filter(|s| s.status != SourceStatus::Ok)
        .count();
    if failed > 0 {
        print_warning(&format!("{} source(s) did not contribute", failed));
    }

    print_list("Recommendations", &report.recommendations);
    print_list("Next steps", &report.next_steps);
}
