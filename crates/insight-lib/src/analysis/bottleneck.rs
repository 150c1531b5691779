//! Cross-resource bottleneck detection
//!
//! Fixed-limit checks over CPU, memory, disk and network with a stable
//! priority ordering shared by the consensus ranking.

use crate::models::{Insight, MetricSnapshot, Severity};
use tracing::debug;

/// Source name attached to insights from this detector
pub const BOTTLENECK_SOURCE: &str = "bottleneck";

const BOTTLENECK_CONFIDENCE: f64 = 85.0;

/// Detection limits, percent unless noted
#[derive(Debug, Clone)]
pub struct BottleneckDetector {
    pub cpu_critical: f64,
    pub cpu_high: f64,
    pub memory_critical: f64,
    pub memory_high: f64,
    pub disk_critical: f64,
    /// Absolute network error count
    pub network_errors_high: u64,
}

impl Default for BottleneckDetector {
    fn default() -> Self {
        Self {
            cpu_critical: 95.0,
            cpu_high: 85.0,
            memory_critical: 95.0,
            memory_high: 85.0,
            disk_critical: 90.0,
            network_errors_high: 100,
        }
    }
}

impl BottleneckDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every check and return the findings in priority order
    pub fn detect(&self, snapshot: &MetricSnapshot) -> Vec<Insight> {
        let mut found: Vec<Insight> = [
            self.check_cpu(snapshot),
            self.check_memory(snapshot),
            self.check_disk(snapshot),
            self.check_network(snapshot),
        ]
        .into_iter()
        .flatten()
        .collect();

        debug!(
            event = "bottlenecks_detected",
            host = %snapshot.hostname,
            count = found.len(),
            "Bottleneck checks complete"
        );

        prioritize(&mut found);
        found
    }

    fn check_cpu(&self, snapshot: &MetricSnapshot) -> Option<Insight> {
        let util = snapshot.cpu.as_ref()?.utilization?;
        let insight = if util > self.cpu_critical {
            bottleneck(
                "cpu",
                Severity::Critical,
                "Severe CPU Bottleneck",
                format!("CPU utilization at {:.1}% indicates a severe bottleneck", util),
                [
                    "Immediate: identify and stop CPU-intensive processes",
                    "Short-term: scale horizontally or vertically",
                    "Long-term: optimize algorithms and code efficiency",
                ],
            )
        } else if util > self.cpu_high {
            bottleneck(
                "cpu",
                Severity::High,
                "CPU Bottleneck Detected",
                format!("CPU utilization at {:.1}% indicates a bottleneck", util),
                [
                    "Monitor CPU trends closely",
                    "Investigate periodic CPU spikes",
                    "Consider capacity planning",
                ],
            )
        } else {
            return None;
        };
        Some(insight.with_evidence("cpu_utilization", util))
    }

    fn check_memory(&self, snapshot: &MetricSnapshot) -> Option<Insight> {
        let util = snapshot.memory.as_ref()?.utilization?;
        let insight = if util > self.memory_critical {
            bottleneck(
                "memory",
                Severity::Critical,
                "Critical Memory Bottleneck",
                format!("Memory utilization at {:.1}%, the system may start swapping", util),
                [
                    "Immediate: free memory by clearing caches or restarting services",
                    "Short-term: add RAM or enable memory optimization",
                    "Long-term: reduce application memory usage",
                ],
            )
        } else if util > self.memory_high {
            bottleneck(
                "memory",
                Severity::High,
                "Memory Pressure Detected",
                format!("Memory utilization at {:.1}%, approaching critical levels", util),
                [
                    "Monitor memory usage patterns",
                    "Check for memory leaks",
                    "Plan memory upgrades",
                ],
            )
        } else {
            return None;
        };
        Some(insight.with_evidence("memory_utilization", util))
    }

    /// First device over the limit, in device-name order
    fn check_disk(&self, snapshot: &MetricSnapshot) -> Option<Insight> {
        let (device, util) = snapshot
            .disk
            .iter()
            .filter_map(|(device, d)| d.utilization.map(|u| (device, u)))
            .find(|(_, u)| *u > self.disk_critical)?;

        Some(
            bottleneck(
                "disk",
                Severity::Critical,
                format!("Disk I/O Bottleneck on {}", device),
                format!("Disk {} utilization at {:.1}%", device, util),
                [
                    "Clean up disk space immediately",
                    "Move data to less utilized storage",
                    "Consider faster storage or capacity expansion",
                ],
            )
            .with_evidence(format!("disk_utilization_{}", device), util),
        )
    }

    fn check_network(&self, snapshot: &MetricSnapshot) -> Option<Insight> {
        let errors = snapshot.network.as_ref()?.error_count;
        if errors <= self.network_errors_high {
            return None;
        }
        Some(
            bottleneck(
                "network",
                Severity::High,
                "Network Error Rate High",
                format!("{} network errors recorded", errors),
                [
                    "Check network hardware and cables",
                    "Investigate application network handling",
                    "Monitor network stability",
                ],
            )
            .with_evidence("network_error_count", errors as f64),
        )
    }
}

fn bottleneck<const N: usize>(
    component: &str,
    severity: Severity,
    title: impl Into<String>,
    observation: String,
    recommendations: [&str; N],
) -> Insight {
    Insight::new(BOTTLENECK_SOURCE, component, severity, title, observation)
        .with_confidence(BOTTLENECK_CONFIDENCE)
        .with_recommendations(recommendations)
}

/// Resource order used to break severity ties; `disk:sda` ranks as `disk`
pub fn component_rank(component: &str) -> u8 {
    let family = component.split(':').next().unwrap_or(component);
    match family.to_ascii_lowercase().as_str() {
        "cpu" => 0,
        "memory" => 1,
        "disk" => 2,
        "network" => 3,
        _ => 99,
    }
}

/// Stable sort by (severity rank, component rank)
pub fn prioritize(insights: &mut [Insight]) {
    insights.sort_by_key(|i| (i.severity.rank(), component_rank(&i.component)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics};

    #[test]
    fn test_cpu_tiers() {
        let detector = BottleneckDetector::new();
        let critical = MetricSnapshot::new("h").with_cpu(CpuMetrics::with_utilization(96.0));
        let high = MetricSnapshot::new("h").with_cpu(CpuMetrics::with_utilization(90.0));
        let none = MetricSnapshot::new("h").with_cpu(CpuMetrics::with_utilization(85.0));

        assert_eq!(detector.detect(&critical)[0].severity, Severity::Critical);
        assert_eq!(detector.detect(&high)[0].severity, Severity::High);
        assert!(detector.detect(&none).is_empty());
    }

    #[test]
    fn test_first_disk_device_only() {
        let snapshot = MetricSnapshot::new("h")
            .with_disk("sdb", DiskMetrics::with_utilization(99.0))
            .with_disk("sda", DiskMetrics::with_utilization(95.0));
        let found = BottleneckDetector::new().detect(&snapshot);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Disk I/O Bottleneck on sda");
        assert!(found[0].evidence.contains_key("disk_utilization_sda"));
    }

    #[test]
    fn test_network_independent_of_disk() {
        let snapshot = MetricSnapshot::new("h")
            .with_disk("sda", DiskMetrics::with_utilization(95.0))
            .with_network(NetworkMetrics {
                error_count: 150,
                ..Default::default()
            });
        let found = BottleneckDetector::new().detect(&snapshot);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].component, "disk");
        assert_eq!(found[1].component, "network");
    }

    #[test]
    fn test_priority_order() {
        let snapshot = MetricSnapshot::new("h")
            .with_cpu(CpuMetrics::with_utilization(88.0))
            .with_memory(MemoryMetrics::with_utilization(97.0))
            .with_disk("sda", DiskMetrics::with_utilization(93.0))
            .with_network(NetworkMetrics {
                error_count: 500,
                ..Default::default()
            });
        let found = BottleneckDetector::new().detect(&snapshot);
        let order: Vec<_> = found.iter().map(|i| i.component.as_str()).collect();
        assert_eq!(order, vec!["memory", "disk", "cpu", "network"]);
    }

    #[test]
    fn test_prioritize_is_stable_for_unknown_components() {
        let mut insights = vec![
            Insight::new("a", "gpu", Severity::Low, "first", ""),
            Insight::new("a", "fan", Severity::Low, "second", ""),
            Insight::new("a", "disk:sda", Severity::Low, "third", ""),
        ];
        prioritize(&mut insights);
        let titles: Vec<_> = insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "first", "second"]);
    }
}
