//! USE Method scoring command

use anyhow::Result;
use insight_lib::analysis::{UseAnalyzer, UseScore};
use insight_lib::EngineConfig;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use super::load_snapshot;
use crate::output::{color_score, color_status, print_info, print_json, print_table, OutputFormat};

/// Row for USE scores table
#[derive(Tabled)]
struct UseRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Util %")]
    utilization: String,
    #[tabled(rename = "Saturation")]
    saturation: String,
    #[tabled(rename = "Errors")]
    errors: String,
    #[tabled(rename = "U")]
    utilization_score: String,
    #[tabled(rename = "S")]
    saturation_score: String,
    #[tabled(rename = "E")]
    errors_score: String,
    #[tabled(rename = "Overall")]
    overall: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&UseScore> for UseRow {
    fn from(score: &UseScore) -> Self {
        Self {
            resource: score.resource.clone(),
            utilization: format!("{:.1}", score.utilization),
            saturation: format!("{:.1}", score.saturation),
            errors: format!("{:.1}", score.errors),
            utilization_score: color_score(score.utilization_score),
            saturation_score: color_score(score.saturation_score),
            errors_score: color_score(score.errors_score),
            overall: color_score(score.overall_score),
            status: color_status(&score.status.to_string()),
        }
    }
}

/// Score every resource in a snapshot against the configured thresholds
pub async fn show_use_scores(
    config: &EngineConfig,
    snapshot: &Path,
    verbose: bool,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = load_snapshot(config, snapshot).await?;
    let analyzer = UseAnalyzer::new(Arc::new(config.threshold_catalog()?))
        .with_verbose(config.verbose || verbose);
    let analysis = analyzer.analyze(&snapshot);

    match format {
        OutputFormat::Json => print_json(&analysis)?,
        OutputFormat::Table => {
            print_info(&format!("USE scores for {}", snapshot.hostname));
            let rows: Vec<UseRow> = analysis.scores.iter().map(UseRow::from).collect();
            print_table(&rows);

            for score in analysis.scores.iter().filter(|s| verbose || s.status.severity().is_some()) {
                println!("\n{} ({}):", score.resource, score.status);
                for recommendation in &score.recommendations {
                    println!("  - {}", recommendation);
                }
            }
        }
    }

    Ok(())
}
