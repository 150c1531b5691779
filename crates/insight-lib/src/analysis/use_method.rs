//! USE Method scoring
//!
//! Scores each resource in a snapshot on Utilization, Saturation and Errors
//! against the threshold catalog and turns non-OK resources into insights.

use crate::error::{EngineError, Result};
use crate::models::{Insight, MetricSnapshot, Severity};
use crate::thresholds::{Threshold, ThresholdCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source name attached to insights from this analyzer
pub const USE_SOURCE: &str = "use_method";

/// Confidence of threshold-based findings
const USE_CONFIDENCE: f64 = 90.0;

/// Status of a resource after scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UseStatus {
    Ok,
    Warning,
    Critical,
}

impl UseStatus {
    /// Insight severity for a non-OK status
    pub fn severity(&self) -> Option<Severity> {
        match self {
            UseStatus::Critical => Some(Severity::Critical),
            UseStatus::Warning => Some(Severity::High),
            UseStatus::Ok => None,
        }
    }
}

impl fmt::Display for UseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UseStatus::Ok => write!(f, "OK"),
            UseStatus::Warning => write!(f, "WARNING"),
            UseStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Per-resource USE result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseScore {
    pub resource: String,
    pub utilization: f64,
    pub saturation: f64,
    pub errors: f64,
    pub utilization_score: f64,
    pub saturation_score: f64,
    pub errors_score: f64,
    /// Max of the three component scores
    pub overall_score: f64,
    pub status: UseStatus,
    pub recommendations: Vec<String>,
}

/// Scores plus the insights derived from them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UseAnalysis {
    pub scores: Vec<UseScore>,
    pub insights: Vec<Insight>,
}

/// Raw U/S/E readings extracted for one resource
struct Readings {
    resource: String,
    utilization: Option<f64>,
    saturation: f64,
    errors: f64,
}

pub struct UseAnalyzer {
    thresholds: Arc<ThresholdCatalog>,
    /// Emit INFO insights for resources that are OK
    pub verbose: bool,
}

impl UseAnalyzer {
    pub fn new(thresholds: Arc<ThresholdCatalog>) -> Self {
        Self {
            thresholds,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Score every resource present in the snapshot
    pub fn analyze(&self, snapshot: &MetricSnapshot) -> UseAnalysis {
        let mut analysis = UseAnalysis::default();

        for readings in extract_readings(snapshot) {
            let Some(utilization) = readings.utilization else {
                debug!(
                    event = "use_resource_skipped",
                    resource = %readings.resource,
                    reason = "missing_data",
                    "No utilization reading, skipping resource"
                );
                continue;
            };

            match self.score_resource(
                &readings.resource,
                utilization,
                readings.saturation,
                readings.errors,
            ) {
                Ok(score) => {
                    if let Some(insight) = self.insight_for(&score) {
                        analysis.insights.push(insight);
                    }
                    analysis.scores.push(score);
                }
                Err(e @ EngineError::MissingData { .. }) => {
                    debug!(
                        event = "use_resource_skipped",
                        resource = %readings.resource,
                        reason = e.reason_code(),
                        "{}", e
                    );
                }
                Err(e) => {
                    warn!(
                        event = "use_resource_failed",
                        resource = %readings.resource,
                        reason = e.reason_code(),
                        error = %e,
                        "USE scoring failed"
                    );
                    analysis.insights.push(failure_insight(&readings.resource, &e));
                }
            }
        }

        analysis
    }

    /// Score a single resource from raw readings
    pub fn score_resource(
        &self,
        resource: &str,
        utilization: f64,
        saturation: f64,
        errors: f64,
    ) -> Result<UseScore> {
        let threshold = self
            .thresholds
            .get(resource)
            .ok_or_else(|| EngineError::missing(resource, "threshold"))?;

        for (field, value) in [
            ("utilization", utilization),
            ("saturation", saturation),
            ("errors", errors),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::analysis(
                    resource,
                    format!("{} reading {} is not a finite non-negative number", field, value),
                ));
            }
        }

        let utilization_score = score(utilization, threshold.warning_utilization);
        let saturation_score = score(saturation, threshold.warning_saturation);
        let errors_score = score(errors, threshold.warning_errors);
        let overall_score = utilization_score.max(saturation_score).max(errors_score);
        let status = classify(threshold, utilization, saturation, errors);

        Ok(UseScore {
            resource: resource.to_string(),
            utilization,
            saturation,
            errors,
            utilization_score,
            saturation_score,
            errors_score,
            overall_score,
            status,
            recommendations: recommendations(resource, utilization, saturation, errors, status),
        })
    }

    fn insight_for(&self, score: &UseScore) -> Option<Insight> {
        let severity = match score.status.severity() {
            Some(severity) => severity,
            None if self.verbose => Severity::Info,
            None => return None,
        };

        let insight = Insight::new(
            USE_SOURCE,
            score.resource.clone(),
            severity,
            format!("{} USE status {}", score.resource, score.status),
            format!(
                "utilization {:.1}%, saturation {:.1}%, errors {:.2} (overall score {:.0})",
                score.utilization, score.saturation, score.errors, score.overall_score
            ),
        )
        .with_confidence(USE_CONFIDENCE)
        .with_recommendations(score.recommendations.clone())
        .with_evidence("utilization", score.utilization)
        .with_evidence("saturation", score.saturation)
        .with_evidence("errors", score.errors)
        .with_evidence("utilization_score", score.utilization_score)
        .with_evidence("saturation_score", score.saturation_score)
        .with_evidence("errors_score", score.errors_score)
        .with_evidence("overall_score", score.overall_score);

        Some(insight)
    }
}

/// `100 * value / limit`, capped to [0, 100]; a zero limit scores any positive value at 100
fn score(value: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        (100.0 * value / limit).clamp(0.0, 100.0)
    } else if value > 0.0 {
        100.0
    } else {
        0.0
    }
}

fn classify(threshold: &Threshold, utilization: f64, saturation: f64, errors: f64) -> UseStatus {
    if errors > threshold.critical_errors
        || utilization >= threshold.critical_utilization
        || saturation >= threshold.critical_saturation
    {
        UseStatus::Critical
    } else if utilization > threshold.warning_utilization
        || saturation > threshold.warning_saturation
    {
        UseStatus::Warning
    } else {
        UseStatus::Ok
    }
}

fn extract_readings(snapshot: &MetricSnapshot) -> Vec<Readings> {
    let mut out = Vec::new();

    if let Some(cpu) = &snapshot.cpu {
        out.push(Readings {
            resource: "cpu".to_string(),
            utilization: cpu.utilization,
            saturation: cpu.load_per_core().map(|l| l * 100.0).unwrap_or(0.0),
            errors: cpu.error_rate.unwrap_or(0.0),
        });
    }

    if let Some(memory) = &snapshot.memory {
        out.push(Readings {
            resource: "memory".to_string(),
            utilization: memory.utilization,
            saturation: memory.swap_utilization.unwrap_or(0.0),
            errors: memory.error_rate.unwrap_or(0.0),
        });
    }

    for (device, disk) in &snapshot.disk {
        out.push(Readings {
            resource: format!("disk:{}", device),
            utilization: disk.utilization,
            saturation: disk.saturation.unwrap_or(0.0),
            errors: disk.error_rate.unwrap_or(0.0),
        });
    }

    if let Some(network) = &snapshot.network {
        out.push(Readings {
            resource: "network".to_string(),
            utilization: network.busiest_interface().map(|(_, u)| u),
            saturation: network.drop_rate.unwrap_or(0.0),
            errors: network.error_rate.unwrap_or(0.0),
        });
    }

    out
}

fn recommendations(
    resource: &str,
    utilization: f64,
    saturation: f64,
    errors: f64,
    status: UseStatus,
) -> Vec<String> {
    let family = resource.split(':').next().unwrap_or(resource);
    let mut out = Vec::new();
    let mut push = |cond: bool, text: &str| {
        if cond {
            out.push(text.to_string());
        }
    };

    match family {
        "cpu" => {
            push(
                utilization > 80.0,
                "CPU utilization >80%: consider scaling up or optimizing CPU-intensive processes",
            );
            push(
                saturation > 20.0,
                "CPU saturation detected: high load average indicates system overload",
            );
            push(
                errors > 0.0,
                "CPU errors detected: check for virtualization contention or steal time",
            );
        }
        "memory" => {
            push(
                utilization > 85.0,
                "Memory utilization >85%: risk of OOM, add RAM or reduce memory usage",
            );
            push(
                saturation > 10.0,
                "Swap usage >10%: performance degradation, increase RAM or tune applications",
            );
            push(
                errors > 0.0,
                "Memory errors detected: possible OOM kills, immediate action required",
            );
        }
        "disk" => {
            push(
                utilization > 70.0,
                "Disk usage >70%: risk of full disk, implement cleanup and monitoring",
            );
            push(
                saturation > 30.0,
                "Disk I/O saturation: storage bottleneck, consider faster storage or I/O tuning",
            );
            push(
                errors > 0.0,
                "Disk I/O errors: possible hardware issues, check disk health",
            );
        }
        "network" => {
            push(
                utilization > 80.0,
                "Network utilization >80%: bandwidth saturation, consider a link upgrade",
            );
            push(
                saturation > 15.0,
                "Packet drops detected: network congestion, check network configuration",
            );
            push(
                errors > 0.0,
                "Network errors: hardware or configuration issues, check interfaces",
            );
        }
        _ => {}
    }

    out.push(
        match status {
            UseStatus::Critical => "CRITICAL: immediate action required to prevent system failure",
            UseStatus::Warning => "WARNING: monitor closely and plan corrective actions",
            UseStatus::Ok => "OK: resource operating within normal parameters",
        }
        .to_string(),
    );
    out
}

fn failure_insight(resource: &str, err: &EngineError) -> Insight {
    Insight::new(
        USE_SOURCE,
        resource,
        Severity::Critical,
        format!("{} USE analysis failed", resource),
        err.to_string(),
    )
    .with_confidence(0.0)
    .with_recommendations([format!("Analysis failed: {}", err)])
}
