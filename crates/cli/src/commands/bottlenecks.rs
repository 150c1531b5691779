//! Bottleneck detection command

use anyhow::Result;
use insight_lib::analysis::BottleneckDetector;
use insight_lib::EngineConfig;
use std::path::Path;

use super::{insight_rows, load_snapshot};
use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat};

/// Detect bottlenecks in a snapshot, most urgent first
pub async fn show_bottlenecks(
    config: &EngineConfig,
    snapshot: &Path,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = load_snapshot(config, snapshot).await?;
    let insights = BottleneckDetector::new().detect(&snapshot);

    match format {
        OutputFormat::Json => print_json(&insights)?,
        OutputFormat::Table => {
            if insights.is_empty() {
                print_success(&format!("No bottlenecks detected on {}", snapshot.hostname));
                return Ok(());
            }
            print_warning(&format!(
                "{} bottleneck(s) detected on {}",
                insights.len(),
                snapshot.hostname
            ));
            print_table(&insight_rows(&insights));
            for insight in &insights {
                if let Some(first) = insight.recommendations.first() {
                    println!("  {}: {}", insight.component, first);
                }
            }
        }
    }

    Ok(())
}
