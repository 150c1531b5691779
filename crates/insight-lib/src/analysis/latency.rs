//! Latency distribution analysis
//!
//! Computes summary statistics, interpolated percentiles, IQR outliers and a
//! fixed-bin histogram over one batch of latency samples (milliseconds), then
//! classifies the batch by its tail percentiles.

use crate::error::{EngineError, Result};
use crate::models::{Insight, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Source name attached to insights from this analyzer
pub const LATENCY_SOURCE: &str = "latency";

/// Default percentiles reported for every batch
pub const DEFAULT_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

/// Number of histogram bins
const HISTOGRAM_BINS: usize = 50;

/// Outlier values kept in the report
const MAX_OUTLIER_EXAMPLES: usize = 10;

/// Sample count at which confidence saturates
const FULL_CONFIDENCE_SAMPLES: usize = 100;

/// Latency class derived from p95/p99
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PerformanceClass {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Critical,
}

impl PerformanceClass {
    /// First matching tier wins
    pub fn classify(p95: f64, p99: f64) -> Self {
        if p95 < 10.0 && p99 < 20.0 {
            PerformanceClass::Excellent
        } else if p95 < 50.0 && p99 < 100.0 {
            PerformanceClass::Good
        } else if p95 < 200.0 && p99 < 500.0 {
            PerformanceClass::Acceptable
        } else if p95 < 1000.0 && p99 < 2000.0 {
            PerformanceClass::Poor
        } else {
            PerformanceClass::Critical
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PerformanceClass::Excellent => Severity::Info,
            PerformanceClass::Good => Severity::Low,
            PerformanceClass::Acceptable => Severity::Medium,
            PerformanceClass::Poor => Severity::High,
            PerformanceClass::Critical => Severity::Critical,
        }
    }
}

impl fmt::Display for PerformanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PerformanceClass::Excellent => "EXCELLENT",
            PerformanceClass::Good => "GOOD",
            PerformanceClass::Acceptable => "ACCEPTABLE",
            PerformanceClass::Poor => "POOR",
            PerformanceClass::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub q1: f64,
    pub q3: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub count: usize,
    pub percentage: f64,
    /// First outliers in input order
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub counts: Vec<u64>,
    /// `counts.len() + 1` edges
    pub bin_edges: Vec<f64>,
    /// Counts divided by the largest count
    pub normalized: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    pub statistics: LatencyStatistics,
    /// Keyed `p50`, `p95`, `p99.9`, ...
    pub percentiles: BTreeMap<String, f64>,
    pub p95: f64,
    pub p99: f64,
    pub outliers: OutlierSummary,
    pub histogram: Histogram,
    pub performance_class: PerformanceClass,
    pub recommendations: Vec<String>,
    pub unit: String,
    /// Samples discarded as non-finite or negative
    pub dropped_samples: usize,
}

pub struct LatencyAnalyzer {
    percentiles: Vec<f64>,
}

impl LatencyAnalyzer {
    pub fn new() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }

    /// Use a custom percentile list; each value must lie in [0, 100]
    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Result<Self> {
        if percentiles.is_empty() {
            return Err(EngineError::InvalidConfig(
                "percentile list must not be empty".to_string(),
            ));
        }
        if let Some(bad) = percentiles
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0 || **p > 100.0)
        {
            return Err(EngineError::InvalidConfig(format!(
                "percentile {} outside [0, 100]",
                bad
            )));
        }
        self.percentiles = percentiles;
        Ok(self)
    }

    pub fn analyze(&self, samples: &[f64]) -> Result<LatencyReport> {
        let mut values: Vec<f64> = samples
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        let dropped = samples.len() - values.len();
        if dropped > 0 {
            warn!(
                event = "latency_samples_dropped",
                dropped,
                total = samples.len(),
                "Dropped non-finite or negative latency samples"
            );
        }
        if values.is_empty() {
            return Err(EngineError::EmptyInput("latency samples".to_string()));
        }

        let input_order = values.clone();
        values.sort_by(f64::total_cmp);
        let sorted = values;

        let statistics = statistics(&sorted);

        let percentiles = self
            .percentiles
            .iter()
            .map(|p| (percentile_key(*p), percentile(&sorted, *p)))
            .collect::<BTreeMap<_, _>>();
        let p95 = percentile(&sorted, 95.0);
        let p99 = percentile(&sorted, 99.0);

        let outliers = outliers(&sorted, &input_order);
        let histogram = histogram(&sorted, HISTOGRAM_BINS);
        let performance_class = PerformanceClass::classify(p95, p99);
        let recommendations = recommendations(p95, p99, outliers.percentage);

        info!(
            event = "latency_analyzed",
            count = statistics.count,
            p95,
            class = %performance_class,
            "Latency analysis complete"
        );

        Ok(LatencyReport {
            statistics,
            percentiles,
            p95,
            p99,
            outliers,
            histogram,
            performance_class,
            recommendations,
            unit: "milliseconds".to_string(),
            dropped_samples: dropped,
        })
    }

    /// Summarize a report as a single insight
    pub fn insight(&self, report: &LatencyReport) -> Insight {
        let count = report.statistics.count;
        let confidence = if count >= FULL_CONFIDENCE_SAMPLES {
            90.0
        } else {
            50.0 + 40.0 * count as f64 / FULL_CONFIDENCE_SAMPLES as f64
        };

        let mut insight = Insight::new(
            LATENCY_SOURCE,
            "latency",
            report.performance_class.severity(),
            format!("Latency performance {}", report.performance_class),
            format!(
                "p95 {:.2}ms, p99 {:.2}ms over {} samples ({:.1}% outliers)",
                report.p95, report.p99, count, report.outliers.percentage
            ),
        )
        .with_confidence(confidence)
        .with_recommendations(report.recommendations.clone())
        .with_evidence("mean", report.statistics.mean)
        .with_evidence("std_dev", report.statistics.std_dev)
        .with_evidence("outlier_percentage", report.outliers.percentage);

        for (key, value) in &report.percentiles {
            insight = insight.with_evidence(key.clone(), *value);
        }
        insight
            .with_evidence("p95", report.p95)
            .with_evidence("p99", report.p99)
    }
}

impl Default for LatencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear-interpolation percentile over sorted samples (rank = p/100 * (n-1))
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

fn percentile_key(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("p{}", p as u32)
    } else {
        format!("p{}", p)
    }
}

fn statistics(sorted: &[f64]) -> LatencyStatistics {
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    LatencyStatistics {
        count: sorted.len(),
        mean,
        median: percentile(sorted, 50.0),
        std_dev: variance.sqrt(),
        min,
        max,
        range: max - min,
    }
}

fn outliers(sorted: &[f64], input_order: &[f64]) -> OutlierSummary {
    let q1 = percentile(sorted, 25.0);
    let q3 = percentile(sorted, 75.0);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let outside: Vec<f64> = input_order
        .iter()
        .copied()
        .filter(|v| *v < lower_fence || *v > upper_fence)
        .collect();

    OutlierSummary {
        q1,
        q3,
        lower_fence,
        upper_fence,
        count: outside.len(),
        percentage: outside.len() as f64 / sorted.len() as f64 * 100.0,
        values: outside.into_iter().take(MAX_OUTLIER_EXAMPLES).collect(),
    }
}

fn histogram(sorted: &[f64], bins: usize) -> Histogram {
    let (mut lo, mut hi) = (sorted[0], sorted[sorted.len() - 1]);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0u64; bins];
    for v in sorted {
        // last bin is closed on the right
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let bin_edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let peak = counts.iter().copied().max().unwrap_or(0);
    let normalized = counts
        .iter()
        .map(|c| if peak > 0 { *c as f64 / peak as f64 } else { 0.0 })
        .collect();

    Histogram {
        counts,
        bin_edges,
        normalized,
    }
}

fn recommendations(p95: f64, p99: f64, outlier_percentage: f64) -> Vec<String> {
    let mut out = Vec::new();
    if p95 > 100.0 {
        out.push(
            "P95 latency >100ms: investigate slow queries, inefficient algorithms or resource contention"
                .to_string(),
        );
    }
    if p99 > 500.0 {
        out.push(
            "P99 latency >500ms: severe tail latency, consider caching, connection pooling or async processing"
                .to_string(),
        );
    }
    if outlier_percentage > 5.0 {
        out.push(
            "Outliers >5%: unstable latency, look for GC pauses, network blips or resource starvation"
                .to_string(),
        );
    }
    if p95 < 10.0 && p99 < 20.0 {
        out.push(
            "Excellent latency: keep monitoring and record this batch as a baseline".to_string(),
        );
    }
    out
}
