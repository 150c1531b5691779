//! Scatter/gather analysis pipeline
//!
//! Every source runs on its own task under a time budget. The engine waits
//! for all of them, converts timeouts, errors and panics into empty
//! contributions, and hands the lot to the consensus aggregator.

use crate::config::EngineConfig;
use crate::consensus::{ConsensusAggregator, SourceContribution, SourceOutcome};
use crate::error::{EngineError, Result};
use crate::models::{ConsensusReport, Insight, MetricSnapshot, SourceStatus};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::sources::{build_sources, AnalysisSource};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything one analysis pass looks at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub snapshot: MetricSnapshot,
    /// Request latencies in milliseconds
    #[serde(default)]
    pub latency_samples: Vec<f64>,
}

impl AnalysisInput {
    pub fn new(snapshot: MetricSnapshot) -> Self {
        Self {
            snapshot,
            latency_samples: Vec::new(),
        }
    }

    pub fn with_latency_samples(mut self, samples: Vec<f64>) -> Self {
        self.latency_samples = samples;
        self
    }
}

pub struct PerformanceEngine {
    sources: Vec<Arc<dyn AnalysisSource>>,
    default_timeout: Duration,
    aggregator: ConsensusAggregator,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl PerformanceEngine {
    pub fn builder() -> PerformanceEngineBuilder {
        PerformanceEngineBuilder::new()
    }

    /// Engine with the sources, thresholds and limits named in the configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let thresholds = Arc::new(config.threshold_catalog()?);
        let sources = build_sources(config, thresholds)?;

        let mut aggregator =
            ConsensusAggregator::new().with_max_recommendations(config.max_recommendations);
        if let Some(expected) = config.expected_sources {
            aggregator = aggregator.with_expected_sources(expected);
        }

        let engine = Self {
            sources,
            default_timeout: config.source_timeout(),
            aggregator,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new(local_host()),
        };
        engine
            .logger
            .log_startup(env!("CARGO_PKG_VERSION"), engine.sources.len());
        Ok(engine)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run every source and merge their findings
    pub async fn analyze(&self, input: AnalysisInput) -> ConsensusReport {
        self.analyze_with(input, Vec::new()).await
    }

    /// Like [`analyze`](Self::analyze), also merging contributions produced elsewhere
    pub async fn analyze_with(
        &self,
        input: AnalysisInput,
        external: Vec<SourceContribution>,
    ) -> ConsensusReport {
        let started = Instant::now();
        let mut contributions = self.gather(Arc::new(input)).await;
        contributions.extend(external);

        let report = self.aggregator.aggregate(contributions);
        for insight in &report.insights {
            self.logger.log_insight(insight);
        }

        let elapsed = started.elapsed();
        self.metrics.observe_analysis_latency(elapsed.as_secs_f64());
        self.metrics.record_report(&report);
        self.logger.log_report(&report, elapsed.as_millis());
        report
    }

    /// Fan out to every source and wait for all of them
    pub async fn gather(&self, input: Arc<AnalysisInput>) -> Vec<SourceContribution> {
        let pending = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let input = Arc::clone(&input);
            let name = source.name().to_string();
            let budget = source.timeout().unwrap_or(self.default_timeout);
            let started = Instant::now();

            let handle = tokio::spawn(async move {
                tokio::time::timeout(budget, async { source.analyze(&input).await }).await
            });

            async move { (name, budget, handle.await, started.elapsed()) }
        });

        join_all(pending)
            .await
            .into_iter()
            .map(|(name, budget, joined, elapsed)| {
                let (contribution, reason) = match joined {
                    Ok(Ok(Ok(insights))) => (SourceContribution::ok(&name, insights), None),
                    Ok(Ok(Err(e @ EngineError::SourceTimeout { .. }))) => {
                        (SourceContribution::timed_out(&name), Some(e.reason_code()))
                    }
                    Ok(Ok(Err(e))) => (
                        SourceContribution::failed(&name, e.to_string()),
                        Some(e.reason_code()),
                    ),
                    Ok(Err(_)) => {
                        let e = EngineError::SourceTimeout {
                            source_name: name.clone(),
                            budget,
                        };
                        (SourceContribution::timed_out(&name), Some(e.reason_code()))
                    }
                    Err(join_err) => (
                        SourceContribution::failed(&name, format!("task failed: {}", join_err)),
                        Some(if join_err.is_panic() {
                            "task_panicked"
                        } else {
                            "task_cancelled"
                        }),
                    ),
                };
                self.record_outcome(&contribution, reason, elapsed);
                contribution
            })
            .collect()
    }

    fn record_outcome(
        &self,
        contribution: &SourceContribution,
        reason: Option<&str>,
        elapsed: Duration,
    ) {
        let (status, count) = match &contribution.outcome {
            SourceOutcome::Insights(list) => (SourceStatus::Ok, list.len()),
            SourceOutcome::Failed(_) => (SourceStatus::Failed, 0),
            SourceOutcome::TimedOut => (SourceStatus::TimedOut, 0),
        };
        self.metrics
            .observe_source(&contribution.source, status, elapsed.as_secs_f64());
        self.logger.log_source_outcome(
            &contribution.source,
            status,
            count,
            reason,
            elapsed.as_millis(),
        );
    }
}

/// Builder for [`PerformanceEngine`]
pub struct PerformanceEngineBuilder {
    sources: Vec<Arc<dyn AnalysisSource>>,
    default_timeout: Duration,
    aggregator: ConsensusAggregator,
    host: Option<String>,
}

impl PerformanceEngineBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            default_timeout: DEFAULT_SOURCE_TIMEOUT,
            aggregator: ConsensusAggregator::new(),
            host: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn AnalysisSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = Arc<dyn AnalysisSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Budget for sources that do not declare their own
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn aggregator(mut self, aggregator: ConsensusAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Host name attached to engine log events
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn build(self) -> anyhow::Result<PerformanceEngine> {
        if self.sources.is_empty() {
            anyhow::bail!("At least one analysis source is required");
        }
        if self.default_timeout.is_zero() {
            anyhow::bail!("Source timeout must be greater than zero");
        }

        let engine = PerformanceEngine {
            sources: self.sources,
            default_timeout: self.default_timeout,
            aggregator: self.aggregator,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new(self.host.unwrap_or_else(local_host)),
        };
        engine
            .logger
            .log_startup(env!("CARGO_PKG_VERSION"), engine.sources.len());
        Ok(engine)
    }
}

impl Default for PerformanceEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn local_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Insights supplied by a caller outside the engine, wrapped as a contribution
pub fn external_contribution(source: impl Into<String>, insights: Vec<Insight>) -> SourceContribution {
    SourceContribution::ok(source, insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuMetrics, MemoryMetrics, Severity};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        name: &'static str,
        severity: Severity,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(name: &'static str, severity: Severity) -> Self {
            Self {
                name,
                severity,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn analyze(&self, _input: &AnalysisInput) -> Result<Vec<Insight>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Insight::new(self.name, "cpu", self.severity, "t", "o").with_confidence(80.0)])
        }
    }

    struct SlowSource;

    #[async_trait]
    impl AnalysisSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(20))
        }

        async fn analyze(&self, _input: &AnalysisInput) -> Result<Vec<Insight>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![Insight::new("slow", "cpu", Severity::Critical, "late", "o")])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl AnalysisSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn analyze(&self, _input: &AnalysisInput) -> Result<Vec<Insight>> {
            Err(EngineError::analysis("failing", "backend unavailable"))
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl AnalysisSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn analyze(&self, _input: &AnalysisInput) -> Result<Vec<Insight>> {
            panic!("source bug");
        }
    }

    fn input() -> AnalysisInput {
        AnalysisInput::new(
            MetricSnapshot::new("h")
                .with_cpu(CpuMetrics::with_utilization(96.0))
                .with_memory(MemoryMetrics::with_utilization(50.0)),
        )
    }

    #[tokio::test]
    async fn test_degraded_sources_contribute_nothing() {
        let healthy = Arc::new(FixedSource::new("healthy", Severity::High));
        let engine = PerformanceEngine::builder()
            .source(healthy.clone())
            .source(Arc::new(SlowSource))
            .source(Arc::new(FailingSource))
            .source(Arc::new(PanickingSource))
            .host("test-host")
            .build()
            .unwrap();

        let report = engine.analyze(input()).await;

        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.insights.len(), 1);
        assert_eq!(report.insights[0].source, "healthy");

        let status = |name: &str| {
            report
                .sources
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.status)
                .unwrap()
        };
        assert_eq!(status("healthy"), SourceStatus::Ok);
        assert_eq!(status("slow"), SourceStatus::TimedOut);
        assert_eq!(status("failing"), SourceStatus::Failed);
        assert_eq!(status("panicking"), SourceStatus::Failed);
    }

    #[tokio::test]
    async fn test_unresponsive_llm_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let llm = crate::sources::LlmSourceBuilder::new()
            .endpoint(format!("http://{}", addr))
            .model("llama3")
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let engine = PerformanceEngine::builder()
            .source(Arc::new(llm))
            .build()
            .unwrap();

        let report = engine.analyze(input()).await;
        assert!(report.insights.is_empty());
        assert_eq!(report.sources[0].name, "llm");
        assert_eq!(report.sources[0].status, SourceStatus::TimedOut);
        assert_eq!(report.sources[0].reason, None);
    }

    #[tokio::test]
    async fn test_contributions_keep_source_order() {
        let engine = PerformanceEngine::builder()
            .source(Arc::new(FixedSource::new("a", Severity::Low)))
            .source(Arc::new(FailingSource))
            .source(Arc::new(FixedSource::new("b", Severity::Low)))
            .build()
            .unwrap();

        let contributions = engine.gather(Arc::new(input())).await;
        let names: Vec<_> = contributions.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(names, vec!["a", "failing", "b"]);
    }

    #[tokio::test]
    async fn test_external_insights_are_merged() {
        let engine = PerformanceEngine::builder()
            .source(Arc::new(FixedSource::new("a", Severity::Low)))
            .build()
            .unwrap();
        let external = external_contribution(
            "apm",
            vec![Insight::new("apm", "memory", Severity::Critical, "leak", "o").with_confidence(90.0)],
        );

        let report = engine.analyze_with(input(), vec![external]).await;
        assert_eq!(report.insights.len(), 2);
        assert_eq!(report.insights[0].source, "apm");
        assert_eq!(report.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_engine_from_default_config() {
        let engine = PerformanceEngine::from_config(&EngineConfig::default()).unwrap();
        assert_eq!(engine.source_names().len(), 9);

        let report = engine
            .analyze(input().with_latency_samples(vec![12.0, 15.0, 18.0, 30.0, 45.0]))
            .await;

        assert!(report.sources.iter().all(|s| s.status == SourceStatus::Ok));
        let first = &report.insights[0];
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.component, "cpu");
        assert!(report.consensus_score > 0.0 && report.consensus_score <= 100.0);
        assert_eq!(report.recommendations[0], "IMMEDIATE ACTION REQUIRED: address critical performance issues");
    }

    #[test]
    fn test_builder_requires_sources() {
        assert!(PerformanceEngineBuilder::new().build().is_err());
    }
}
