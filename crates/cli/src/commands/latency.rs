//! Latency distribution command

use anyhow::Result;
use insight_lib::analysis::{LatencyAnalyzer, LatencyReport};
use insight_lib::EngineConfig;
use std::path::Path;
use tabled::Tabled;

use super::{load_samples, print_list};
use crate::output::{
    color_status, format_latency, print_info, print_json, print_table, print_warning,
    OutputFormat,
};

/// Row for the statistics table
#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Statistic")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn stat(name: impl Into<String>, value: String) -> StatRow {
    StatRow {
        name: name.into(),
        value,
    }
}

/// Analyze a latency sample file
pub async fn show_latency(
    config: &EngineConfig,
    samples: &Path,
    percentiles: Option<Vec<f64>>,
    format: OutputFormat,
) -> Result<()> {
    let values = load_samples(samples).await?;
    let analyzer = LatencyAnalyzer::new()
        .with_percentiles(percentiles.unwrap_or_else(|| config.percentiles.clone()))?;
    let report = analyzer.analyze(&values)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &LatencyReport) {
    let unit = report.unit.as_str();
    let stats = &report.statistics;

    print_info(&format!(
        "Performance class: {}",
        color_status(&report.performance_class.to_string())
    ));
    if report.dropped_samples > 0 {
        print_warning(&format!(
            "Ignored {} non-finite or negative samples",
            report.dropped_samples
        ));
    }

    let mut rows = vec![
        stat("count", stats.count.to_string()),
        stat("mean", format_latency(stats.mean, unit)),
        stat("median", format_latency(stats.median, unit)),
        stat("std dev", format_latency(stats.std_dev, unit)),
        stat("min", format_latency(stats.min, unit)),
        stat("max", format_latency(stats.max, unit)),
    ];
    rows.extend(
        report
            .percentiles
            .iter()
            .map(|(name, value)| stat(name.as_str(), format_latency(*value, unit))),
    );
    rows.push(stat(
        "outliers",
        format!(
            "{} ({:.1}%, fences {} / {})",
            report.outliers.count,
            report.outliers.percentage,
            format_latency(report.outliers.lower_fence, unit),
            format_latency(report.outliers.upper_fence, unit)
        ),
    ));
    print_table(&rows);

    print_list("Recommendations", &report.recommendations);
}
