//! CLI command implementations

pub mod analyze;
pub mod bottlenecks;
pub mod latency;
pub mod query;
pub mod use_method;

use anyhow::{Context, Result};
use insight_lib::collector::collect_cached;
use insight_lib::{EngineConfig, FileCollector, Insight, MetricSnapshot, SnapshotCache};
use std::path::Path;
use tabled::Tabled;

use crate::output::{color_confidence, color_severity, truncate};

/// Row for insight tables
#[derive(Tabled)]
pub struct InsightRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

impl From<&Insight> for InsightRow {
    fn from(insight: &Insight) -> Self {
        Self {
            severity: color_severity(insight.severity),
            component: insight.component.clone(),
            source: insight.source.clone(),
            title: truncate(&insight.title, 60),
            confidence: color_confidence(insight.confidence),
        }
    }
}

pub fn insight_rows(insights: &[Insight]) -> Vec<InsightRow> {
    insights.iter().map(InsightRow::from).collect()
}

/// File-backed snapshot reader that reuses a read within the configured TTL
pub struct SnapshotLoader {
    collector: FileCollector,
    cache: SnapshotCache,
}

impl SnapshotLoader {
    pub fn new(config: &EngineConfig, path: &Path) -> Self {
        Self {
            collector: FileCollector::new(path),
            cache: config.snapshot_cache(),
        }
    }

    pub async fn load(&mut self) -> Result<MetricSnapshot> {
        collect_cached(&self.collector, &mut self.cache)
            .await
            .with_context(|| {
                format!(
                    "Failed to load snapshot from {}",
                    self.collector.path().display()
                )
            })
    }
}

/// Load a JSON snapshot from disk
pub async fn load_snapshot(config: &EngineConfig, path: &Path) -> Result<MetricSnapshot> {
    SnapshotLoader::new(config, path).load().await
}

/// Load latency samples from disk
pub async fn load_samples(path: &Path) -> Result<Vec<f64>> {
    insight_lib::collector::load_latency_samples(path)
        .await
        .with_context(|| format!("Failed to load latency samples from {}", path.display()))
}

/// Print an indented list under a heading
pub fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}:", heading);
    for item in items {
        println!("  {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_snapshot(path: &Path, hostname: &str) {
        std::fs::write(path, format!(r#"{{"hostname": "{}"}}"#, hostname)).unwrap();
    }

    #[tokio::test]
    async fn test_loader_reuses_snapshot_within_ttl() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_snapshot(file.path(), "first");
        let config = EngineConfig {
            cache_ttl_ms: 60_000,
            ..Default::default()
        };

        let mut loader = SnapshotLoader::new(&config, file.path());
        assert_eq!(loader.load().await.unwrap().hostname, "first");

        write_snapshot(file.path(), "second");
        assert_eq!(loader.load().await.unwrap().hostname, "first");
    }

    #[tokio::test]
    async fn test_loader_rereads_with_zero_ttl() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_snapshot(file.path(), "first");
        let config = EngineConfig {
            cache_ttl_ms: 0,
            ..Default::default()
        };

        let mut loader = SnapshotLoader::new(&config, file.path());
        assert_eq!(loader.load().await.unwrap().hostname, "first");

        write_snapshot(file.path(), "second");
        assert_eq!(loader.load().await.unwrap().hostname, "second");
    }

    #[tokio::test]
    async fn test_load_snapshot_missing_file() {
        let err = load_snapshot(&EngineConfig::default(), Path::new("/nonexistent/snap.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load snapshot"));
    }
}
