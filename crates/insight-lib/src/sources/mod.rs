//! Analysis sources
//!
//! A source turns one [`AnalysisInput`] into a list of insights. The engine
//! runs every configured source concurrently and hands their outputs to the
//! consensus aggregator.

pub mod agents;
pub mod llm;
pub mod local;

use crate::config::{EngineConfig, SourceConfig};
use crate::engine::AnalysisInput;
use crate::error::Result;
use crate::models::Insight;
use crate::thresholds::ThresholdCatalog;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use agents::{AgentRole, RoleKind, RuleBasedAgent};
pub use llm::{parse_llm_response, LlmSource, LlmSourceBuilder};
pub use local::{BottleneckSource, LatencySource, UseMethodSource};

/// Trait for anything that can produce insights from an analysis input
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    /// Stable name used in reports, logs and metrics labels
    fn name(&self) -> &str;

    /// Per-source time budget, overriding the engine default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Insight>>;
}

/// Instantiate the sources listed in the configuration
pub fn build_sources(
    config: &EngineConfig,
    thresholds: Arc<ThresholdCatalog>,
) -> Result<Vec<Arc<dyn AnalysisSource>>> {
    let mut sources: Vec<Arc<dyn AnalysisSource>> = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let built: Arc<dyn AnalysisSource> = match source {
            SourceConfig::UseMethod => Arc::new(
                UseMethodSource::new(thresholds.clone()).with_verbose(config.verbose),
            ),
            SourceConfig::Bottleneck => Arc::new(BottleneckSource::default()),
            SourceConfig::Latency => {
                Arc::new(LatencySource::with_percentiles(config.percentiles.clone())?)
            }
            SourceConfig::RuleBased { role } => Arc::new(RuleBasedAgent::new(*role)),
            SourceConfig::Llm {
                name,
                endpoint,
                model,
                temperature,
                timeout_ms,
            } => {
                let mut builder = LlmSourceBuilder::new()
                    .endpoint(endpoint)
                    .model(model)
                    .temperature(*temperature);
                if let Some(name) = name {
                    builder = builder.name(name);
                }
                if let Some(ms) = timeout_ms {
                    builder = builder.timeout(Duration::from_millis(*ms));
                }
                Arc::new(builder.build()?)
            }
        };
        sources.push(built);
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_every_source() {
        let config = EngineConfig::default();
        let sources = build_sources(&config, Arc::new(ThresholdCatalog::default())).unwrap();
        assert_eq!(sources.len(), config.sources.len());

        let names: Vec<_> = sources.iter().map(|s| s.name().to_string()).collect();
        assert!(names.contains(&"use_method".to_string()));
        assert!(names.contains(&"coordinator_agent".to_string()));
    }

    #[test]
    fn test_llm_source_from_config() {
        let config = EngineConfig {
            sources: vec![SourceConfig::Llm {
                name: Some("ollama".to_string()),
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
                temperature: 0.2,
                timeout_ms: Some(1500),
            }],
            ..Default::default()
        };
        let sources = build_sources(&config, Arc::new(ThresholdCatalog::default())).unwrap();
        assert_eq!(sources[0].name(), "ollama");
        assert_eq!(sources[0].timeout(), Some(Duration::from_millis(1500)));
    }
}
