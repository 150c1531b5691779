//! Engine configuration
//!
//! Loaded from an optional TOML/JSON file plus `PINSIGHT_` environment
//! variables (`__` separates nested keys, e.g. `PINSIGHT_SOURCE_TIMEOUT_MS`).

use crate::analysis::latency::DEFAULT_PERCENTILES;
use crate::collector::SnapshotCache;
use crate::consensus::DEFAULT_MAX_RECOMMENDATIONS;
use crate::error::{EngineError, Result};
use crate::sources::RoleKind;
use crate::thresholds::{ThresholdCatalog, ThresholdOverride};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Which analysis sources the engine runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    UseMethod,
    Bottleneck,
    Latency,
    RuleBased {
        role: RoleKind,
    },
    Llm {
        #[serde(default)]
        name: Option<String>,
        endpoint: String,
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f64,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Emit INFO insights for resources that pass the USE checks
    #[serde(default)]
    pub verbose: bool,

    /// Latency percentiles to report
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,

    /// Time budget for each source, unless the source sets its own
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,

    /// Lifetime of a cached snapshot at the collector boundary
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// Diversity bonus denominator; defaults to the number of sources run
    #[serde(default)]
    pub expected_sources: Option<usize>,

    /// Per-resource overrides applied on top of the default thresholds
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdOverride>,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

fn default_source_timeout_ms() -> u64 {
    5000
}

fn default_cache_ttl_ms() -> u64 {
    1000
}

fn default_max_recommendations() -> usize {
    DEFAULT_MAX_RECOMMENDATIONS
}

fn default_sources() -> Vec<SourceConfig> {
    let mut sources = vec![
        SourceConfig::UseMethod,
        SourceConfig::Bottleneck,
        SourceConfig::Latency,
    ];
    sources.extend(
        RoleKind::ALL
            .into_iter()
            .map(|role| SourceConfig::RuleBased { role }),
    );
    sources
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            percentiles: default_percentiles(),
            source_timeout_ms: default_source_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            max_recommendations: default_max_recommendations(),
            expected_sources: None,
            thresholds: BTreeMap::new(),
            sources: default_sources(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("PINSIGHT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "source_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_recommendations == 0 {
            return Err(EngineError::InvalidConfig(
                "max_recommendations must be greater than zero".to_string(),
            ));
        }
        if self.expected_sources == Some(0) {
            return Err(EngineError::InvalidConfig(
                "expected_sources must be greater than zero".to_string(),
            ));
        }
        if self.sources.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one analysis source must be configured".to_string(),
            ));
        }
        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0 || **p > 100.0)
        {
            return Err(EngineError::InvalidConfig(format!(
                "percentile {} outside [0, 100]",
                p
            )));
        }
        self.threshold_catalog().map(|_| ())
    }

    /// Default thresholds with configured overrides applied
    pub fn threshold_catalog(&self) -> Result<ThresholdCatalog> {
        ThresholdCatalog::default().with_overrides(&self.thresholds)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Empty snapshot cache with the configured TTL
    pub fn snapshot_cache(&self) -> SnapshotCache {
        SnapshotCache::new(self.cache_ttl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.source_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.max_recommendations, 10);
        assert_eq!(config.sources.len(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
verbose = true
source_timeout_ms = 250
cache_ttl_ms = 30000
percentiles = [50.0, 99.0]

[thresholds.cpu]
warning_utilization = 60.0

[[sources]]
kind = "use_method"

[[sources]]
kind = "rule_based"
role = "cost"

[[sources]]
kind = "llm"
endpoint = "http://localhost:11434"
model = "llama3"
"#
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert!(config.verbose);
        assert_eq!(config.snapshot_cache().ttl(), Duration::from_millis(30_000));
        assert_eq!(config.source_timeout_ms, 250);
        assert_eq!(config.percentiles, vec![50.0, 99.0]);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(
            config.sources[1],
            SourceConfig::RuleBased {
                role: RoleKind::Cost
            }
        );
        match &config.sources[2] {
            SourceConfig::Llm { temperature, .. } => assert_eq!(*temperature, 0.7),
            other => panic!("unexpected source {:?}", other),
        }

        let catalog = config.threshold_catalog().unwrap();
        assert_eq!(catalog.get("cpu").unwrap().warning_utilization, 60.0);
        assert_eq!(catalog.get("cpu").unwrap().critical_utilization, 90.0);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/pinsight.toml")));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EngineConfig {
            source_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            percentiles: vec![50.0, 101.0],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut thresholds = BTreeMap::new();
        thresholds.insert(
            "memory".to_string(),
            ThresholdOverride {
                warning_utilization: Some(99.0),
                ..Default::default()
            },
        );
        let config = EngineConfig {
            thresholds,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
