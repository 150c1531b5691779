//! Observability infrastructure for the insight engine
//!
//! Provides:
//! - Prometheus metrics (analysis latency, per-source outcomes, emitted insights, consensus score)
//! - Structured logging with tracing

use crate::models::{ConsensusReport, Insight, Severity, SourceStatus};
use prometheus::{
    register_gauge, register_histogram, register_histogram_vec, register_int_counter_vec, Gauge,
    Histogram, HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for analysis latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    analysis_latency_seconds: Histogram,
    source_latency_seconds: HistogramVec,
    source_outcomes: IntCounterVec,
    insights_emitted: IntCounterVec,
    consensus_score: Gauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            analysis_latency_seconds: register_histogram!(
                "insight_engine_analysis_latency_seconds",
                "Time spent on one full scatter/gather analysis pass",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            source_latency_seconds: register_histogram_vec!(
                "insight_engine_source_latency_seconds",
                "Time spent inside each analysis source",
                &["source"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register source_latency_seconds"),

            source_outcomes: register_int_counter_vec!(
                "insight_engine_source_outcomes_total",
                "Analysis source results by status",
                &["source", "status"]
            )
            .expect("Failed to register source_outcomes"),

            insights_emitted: register_int_counter_vec!(
                "insight_engine_insights_emitted_total",
                "Insights included in consensus reports",
                &["severity"]
            )
            .expect("Failed to register insights_emitted"),

            consensus_score: register_gauge!(
                "insight_engine_consensus_score",
                "Consensus score of the most recent report"
            )
            .expect("Failed to register consensus_score"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn observe_source(&self, source: &str, status: SourceStatus, duration_secs: f64) {
        let inner = self.inner();
        inner
            .source_latency_seconds
            .with_label_values(&[source])
            .observe(duration_secs);
        inner
            .source_outcomes
            .with_label_values(&[source, &status.to_string()])
            .inc();
    }

    /// Record per-severity insight counts and the score of a finished report
    pub fn record_report(&self, report: &ConsensusReport) {
        let inner = self.inner();
        for (severity, count) in &report.counts_by_severity {
            inner
                .insights_emitted
                .with_label_values(&[severity.as_str()])
                .inc_by(*count as u64);
        }
        inner.consensus_score.set(report.consensus_score);
    }

    /// Text exposition of every registered metric
    pub fn gather_text(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mut buf = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buf) {
            warn!(event = "metrics_encode_failed", error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Log the outcome of one source
    pub fn log_source_outcome(
        &self,
        source: &str,
        status: SourceStatus,
        insight_count: usize,
        reason_code: Option<&str>,
        elapsed_ms: u128,
    ) {
        match status {
            SourceStatus::Ok => {
                info!(
                    event = "source_completed",
                    host = %self.host,
                    source = %source,
                    insights = insight_count,
                    elapsed_ms = elapsed_ms as u64,
                    "Analysis source completed"
                );
            }
            _ => {
                warn!(
                    event = "source_degraded",
                    host = %self.host,
                    source = %source,
                    status = %status,
                    reason = reason_code.unwrap_or("unknown"),
                    elapsed_ms = elapsed_ms as u64,
                    "Analysis source produced no insights"
                );
            }
        }
    }

    /// Critical insights are logged at warn level
    pub fn log_insight(&self, insight: &Insight) {
        if insight.severity == Severity::Critical {
            warn!(
                event = "insight_emitted",
                host = %self.host,
                source = %insight.source,
                component = %insight.component,
                severity = %insight.severity,
                confidence = insight.confidence,
                title = %insight.title,
                "Critical insight"
            );
        } else {
            info!(
                event = "insight_emitted",
                host = %self.host,
                source = %insight.source,
                component = %insight.component,
                severity = %insight.severity,
                confidence = insight.confidence,
                title = %insight.title,
                "Insight"
            );
        }
    }

    pub fn log_report(&self, report: &ConsensusReport, elapsed_ms: u128) {
        let critical = report
            .counts_by_severity
            .get(&Severity::Critical)
            .copied()
            .unwrap_or(0);
        info!(
            event = "analysis_completed",
            host = %self.host,
            session_id = %report.session_id,
            insights = report.insights.len(),
            critical,
            consensus_score = report.consensus_score,
            elapsed_ms = elapsed_ms as u64,
            "Analysis pass completed"
        );
    }

    pub fn log_startup(&self, version: &str, source_count: usize) {
        info!(
            event = "engine_started",
            host = %self.host,
            version = %version,
            sources = source_count,
            "Performance insight engine started"
        );
    }
}
