//! Insight query command over saved reports

use anyhow::{Context, Result};
use insight_lib::{ConsensusReport, InsightFilter, InsightQuery};
use std::path::PathBuf;
use tabled::Tabled;

use super::insight_rows;
use crate::output::{color_severity, print_info, print_json, print_table, OutputFormat};

/// Row for summary counts
#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Count")]
    count: usize,
}

async fn load_reports(paths: &[PathBuf]) -> Result<Vec<ConsensusReport>> {
    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        let report: ConsensusReport = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))?;
        reports.push(report);
    }
    Ok(reports)
}

/// Filter insights across one or more saved reports
pub async fn query_reports(
    paths: &[PathBuf],
    filter: InsightFilter,
    summary: bool,
    format: OutputFormat,
) -> Result<()> {
    let reports = load_reports(paths).await?;
    let query = InsightQuery::from_reports(&reports);

    if summary {
        let summary = query.summary();
        match format {
            OutputFormat::Json => print_json(&summary)?,
            OutputFormat::Table => {
                print_info(&format!(
                    "{} insights, {} critical",
                    summary.total, summary.critical
                ));
                let mut rows: Vec<CountRow> = summary
                    .by_severity
                    .iter()
                    .rev()
                    .map(|(severity, count)| CountRow {
                        key: color_severity(*severity),
                        count: *count,
                    })
                    .collect();
                rows.extend(summary.by_component.iter().map(|(component, count)| CountRow {
                    key: component.clone(),
                    count: *count,
                }));
                print_table(&rows);
            }
        }
        return Ok(());
    }

    let result = query.query(&filter);
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_info(&format!(
                "Showing {} of {} matching insights",
                result.insights.len(),
                result.total
            ));
            print_table(&insight_rows(&result.insights));
        }
    }

    Ok(())
}
