//! Core data models for the insight engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of an insight, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All levels, most severe first
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Weight used by the consensus severity bonus
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.5,
            Severity::High => 1.2,
            Severity::Medium => 1.0,
            Severity::Low => 0.8,
            Severity::Info => 0.5,
        }
    }

    /// Presentation rank, lower sorts first
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// A single structured finding produced by an analysis source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    /// Name of the analysis source that produced the insight
    pub source: String,
    /// Resource or component the insight is about
    pub component: String,
    pub severity: Severity,
    pub title: String,
    pub observation: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub evidence: BTreeMap<String, f64>,
    /// Confidence in [0, 100]
    #[serde(deserialize_with = "deserialize_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn new(
        source: impl Into<String>,
        component: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            component: component.into(),
            severity,
            title: title.into(),
            observation: observation.into(),
            recommendations: Vec::new(),
            evidence: BTreeMap::new(),
            confidence: 50.0,
            root_cause: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations = recommendations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_evidence(mut self, name: impl Into<String>, value: f64) -> Self {
        self.evidence.insert(name.into(), value);
        self
    }

    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = Some(root_cause.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.component, self.title)
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_confidence)
}

/// Point-in-time resource measurements supplied by a collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub cpu: Option<CpuMetrics>,
    #[serde(default)]
    pub memory: Option<MemoryMetrics>,
    /// Per-device disk metrics
    #[serde(default)]
    pub disk: BTreeMap<String, DiskMetrics>,
    #[serde(default)]
    pub network: Option<NetworkMetrics>,
}

impl MetricSnapshot {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    pub fn with_cpu(mut self, cpu: CpuMetrics) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn with_memory(mut self, memory: MemoryMetrics) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_disk(mut self, device: impl Into<String>, disk: DiskMetrics) -> Self {
        self.disk.insert(device.into(), disk);
        self
    }

    pub fn with_network(mut self, network: NetworkMetrics) -> Self {
        self.network = Some(network);
        self
    }

    /// Resolve a named metric, e.g. `cpu_utilization` or `disk_utilization_sda`
    pub fn metric(&self, name: &str) -> Option<f64> {
        if let Some(device) = name.strip_prefix("disk_utilization_") {
            return self.disk.get(device).and_then(|d| d.utilization);
        }
        match name {
            "cpu_utilization" | "cpu_percent" => self.cpu.as_ref()?.utilization,
            "load_1m" | "load_average" | "load_avg" => self.cpu.as_ref()?.load_1m,
            "load_per_core" | "load_per_cpu" => self.cpu.as_ref()?.load_per_core(),
            "memory_utilization" | "memory_percent" => self.memory.as_ref()?.utilization,
            "swap_utilization" | "swap_used" => self.memory.as_ref()?.swap_utilization,
            "network_error_count" | "network_errors" => {
                self.network.as_ref().map(|n| n.error_count as f64)
            }
            "network_drop_count" | "network_drops" => {
                self.network.as_ref().map(|n| n.drop_count as f64)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    /// Busy percentage across all cores
    pub utilization: Option<f64>,
    pub load_1m: Option<f64>,
    pub load_5m: Option<f64>,
    pub load_15m: Option<f64>,
    pub core_count: Option<u32>,
    pub error_rate: Option<f64>,
}

impl CpuMetrics {
    pub fn with_utilization(utilization: f64) -> Self {
        Self {
            utilization: Some(utilization),
            ..Default::default()
        }
    }

    pub fn load_per_core(&self) -> Option<f64> {
        match (self.load_1m, self.core_count) {
            (Some(load), Some(cores)) if cores > 0 => Some(load / cores as f64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub utilization: Option<f64>,
    pub swap_utilization: Option<f64>,
    pub available_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub error_rate: Option<f64>,
}

impl MemoryMetrics {
    pub fn with_utilization(utilization: f64) -> Self {
        Self {
            utilization: Some(utilization),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    /// Capacity used, percent
    pub utilization: Option<f64>,
    /// Time the device spent busy with I/O, percent
    pub saturation: Option<f64>,
    pub read_bytes_per_sec: Option<f64>,
    pub write_bytes_per_sec: Option<f64>,
    pub error_rate: Option<f64>,
}

impl DiskMetrics {
    pub fn with_utilization(utilization: f64) -> Self {
        Self {
            utilization: Some(utilization),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMetrics {
    pub utilization: Option<f64>,
    pub rx_bytes_per_sec: Option<f64>,
    pub tx_bytes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceMetrics>,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub drop_count: u64,
    /// Errored packets as a percentage of all packets
    pub error_rate: Option<f64>,
    /// Dropped packets as a percentage of all packets
    pub drop_rate: Option<f64>,
}

impl NetworkMetrics {
    pub fn with_interface(mut self, name: impl Into<String>, utilization: f64) -> Self {
        self.interfaces.insert(
            name.into(),
            InterfaceMetrics {
                utilization: Some(utilization),
                ..Default::default()
            },
        );
        self
    }

    /// Interface with the highest measured utilization
    pub fn busiest_interface(&self) -> Option<(&str, f64)> {
        self.interfaces
            .iter()
            .filter_map(|(name, iface)| iface.utilization.map(|u| (name.as_str(), u)))
            .fold(None, |best, (name, u)| match best {
                Some((_, best_u)) if best_u >= u => best,
                _ => Some((name, u)),
            })
    }
}

/// Outcome of one source in an aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Ok => write!(f, "ok"),
            SourceStatus::Failed => write!(f, "failed"),
            SourceStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub name: String,
    pub status: SourceStatus,
    pub insight_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Merged result of one aggregation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub insights: Vec<Insight>,
    /// Consensus score in [0, 100]
    pub consensus_score: f64,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceSummary>,
    #[serde(default)]
    pub counts_by_severity: BTreeMap<Severity, usize>,
}
