//! Rule-based analysis agents
//!
//! Each role looks at the snapshot from one angle (performance,
//! infrastructure, security, cost, reporting, coordination) using fixed
//! rules. Roles are deterministic, so they double as offline stand-ins for
//! the LLM-backed source.

use super::AnalysisSource;
use crate::engine::AnalysisInput;
use crate::error::Result;
use crate::models::{Insight, MetricSnapshot, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One analysis perspective over a snapshot
pub trait AgentRole: Send + Sync {
    fn kind(&self) -> RoleKind;

    fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Insight>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Performance,
    Infrastructure,
    Security,
    Cost,
    Reporting,
    Coordinator,
}

impl RoleKind {
    pub const ALL: [RoleKind; 6] = [
        RoleKind::Performance,
        RoleKind::Infrastructure,
        RoleKind::Security,
        RoleKind::Cost,
        RoleKind::Reporting,
        RoleKind::Coordinator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Performance => "performance",
            RoleKind::Infrastructure => "infrastructure",
            RoleKind::Security => "security",
            RoleKind::Cost => "cost",
            RoleKind::Reporting => "reporting",
            RoleKind::Coordinator => "coordinator",
        }
    }

    pub fn role(&self) -> Box<dyn AgentRole> {
        match self {
            RoleKind::Performance => Box::new(PerformanceRole),
            RoleKind::Infrastructure => Box::new(InfrastructureRole),
            RoleKind::Security => Box::new(SecurityRole),
            RoleKind::Cost => Box::new(CostRole),
            RoleKind::Reporting => Box::new(ReportingRole),
            RoleKind::Coordinator => Box::new(CoordinatorRole),
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RoleKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown agent role: {}", s))
    }
}

fn finding(
    role: RoleKind,
    component: &str,
    severity: Severity,
    title: impl Into<String>,
    observation: impl Into<String>,
    recommendation: &str,
    confidence: f64,
) -> Insight {
    Insight::new(role.as_str(), component, severity, title, observation)
        .with_recommendations([recommendation])
        .with_confidence(confidence)
}

fn cpu_util(snapshot: &MetricSnapshot) -> Option<f64> {
    snapshot.cpu.as_ref().and_then(|c| c.utilization)
}

fn memory_util(snapshot: &MetricSnapshot) -> Option<f64> {
    snapshot.memory.as_ref().and_then(|m| m.utilization)
}

pub struct PerformanceRole;

impl AgentRole for PerformanceRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Performance
    }

    fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Insight> {
        let mut out = Vec::new();

        if let Some(cpu) = cpu_util(snapshot).filter(|u| *u > 80.0) {
            out.push(
                finding(
                    self.kind(),
                    "cpu",
                    if cpu > 90.0 { Severity::High } else { Severity::Medium },
                    "High CPU Utilization Detected",
                    format!("CPU utilization is at {:.1}%, above recommended limits", cpu),
                    "Consider scaling horizontally or optimizing CPU-intensive processes",
                    85.0,
                )
                .with_evidence("cpu_utilization", cpu),
            );
        }

        if let Some(mem) = memory_util(snapshot).filter(|u| *u > 85.0) {
            out.push(
                finding(
                    self.kind(),
                    "memory",
                    if mem > 95.0 { Severity::High } else { Severity::Medium },
                    "High Memory Utilization",
                    format!("Memory utilization is at {:.1}%, approaching saturation", mem),
                    "Investigate memory leaks, add RAM or reduce memory footprint",
                    90.0,
                )
                .with_evidence("memory_utilization", mem),
            );
        }

        let load = snapshot.cpu.as_ref().and_then(|c| Some((c.load_1m?, c.load_per_core()?)));
        if let Some((load_1m, per_core)) = load.filter(|(_, p)| *p > 2.0) {
            out.push(
                finding(
                    self.kind(),
                    "cpu",
                    if per_core > 4.0 { Severity::High } else { Severity::Medium },
                    "High Load Average",
                    format!("Load average {:.2} is {:.1}x the core count", load_1m, per_core),
                    "Investigate CPU bottlenecks and consider load balancing",
                    80.0,
                )
                .with_evidence("load_1m", load_1m)
                .with_evidence("load_per_core", per_core),
            );
        }

        out
    }
}

pub struct InfrastructureRole;

impl AgentRole for InfrastructureRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Infrastructure
    }

    fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Insight> {
        snapshot
            .disk
            .iter()
            .filter_map(|(device, d)| d.utilization.map(|u| (device, u)))
            .filter(|(_, u)| *u > 85.0)
            .map(|(device, util)| {
                finding(
                    self.kind(),
                    &format!("disk:{}", device),
                    if util > 95.0 { Severity::High } else { Severity::Medium },
                    "Disk Space Running Low",
                    format!("Disk {} utilization is at {:.1}%", device, util),
                    "Clean up unnecessary files, archive old data or expand storage",
                    95.0,
                )
                .with_evidence(format!("disk_utilization_{}", device), util)
            })
            .collect()
    }
}

pub struct SecurityRole;

impl AgentRole for SecurityRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Security
    }

    fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Insight> {
        let cpu = cpu_util(snapshot).unwrap_or(0.0);
        let mem = memory_util(snapshot).unwrap_or(0.0);
        if cpu <= 95.0 && mem <= 95.0 {
            return Vec::new();
        }

        vec![finding(
            self.kind(),
            "security",
            Severity::Medium,
            "Unusual Resource Consumption",
            "Extremely high resource usage can indicate abuse such as crypto-mining or a DDoS",
            "Identify the processes driving resource usage and check for compromise",
            60.0,
        )
        .with_evidence("cpu_utilization", cpu)
        .with_evidence("memory_utilization", mem)]
    }
}

pub struct CostRole;

impl AgentRole for CostRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Cost
    }

    fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Insight> {
        let mut out = Vec::new();

        if let Some(cpu) = cpu_util(snapshot).filter(|u| *u < 20.0) {
            out.push(
                finding(
                    self.kind(),
                    "cost",
                    Severity::Low,
                    "Underutilized CPU Resources",
                    format!("CPU utilization is only {:.1}%, likely over-provisioned", cpu),
                    "Consider downsizing instances or consolidating workloads",
                    75.0,
                )
                .with_evidence("cpu_utilization", cpu),
            );
        }

        if let Some(mem) = memory_util(snapshot).filter(|u| *u < 30.0) {
            out.push(
                finding(
                    self.kind(),
                    "cost",
                    Severity::Low,
                    "Underutilized Memory Resources",
                    format!("Memory utilization is only {:.1}%, suggesting over-allocation", mem),
                    "Right-size memory allocation or use smaller instance types",
                    70.0,
                )
                .with_evidence("memory_utilization", mem),
            );
        }

        out
    }
}

pub struct ReportingRole;

impl AgentRole for ReportingRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Reporting
    }

    fn evaluate(&self, _snapshot: &MetricSnapshot) -> Vec<Insight> {
        vec![finding(
            self.kind(),
            "monitoring",
            Severity::Info,
            "Monitoring Enhancement Recommended",
            "Comprehensive monitoring gives better visibility into system performance",
            "Set up dashboards, alerts and regular performance reports",
            80.0,
        )]
    }
}

pub struct CoordinatorRole;

impl CoordinatorRole {
    /// Mean headroom across CPU, memory and the fullest disk that were measured
    pub fn health_score(snapshot: &MetricSnapshot) -> Option<f64> {
        let disk = snapshot
            .disk
            .values()
            .filter_map(|d| d.utilization)
            .reduce(f64::max);
        let measured: Vec<f64> = [cpu_util(snapshot), memory_util(snapshot), disk]
            .into_iter()
            .flatten()
            .collect();
        if measured.is_empty() {
            return None;
        }
        Some(measured.iter().map(|u| 100.0 - u).sum::<f64>() / measured.len() as f64)
    }
}

impl AgentRole for CoordinatorRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Coordinator
    }

    fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Insight> {
        let Some(health) = Self::health_score(snapshot) else {
            return Vec::new();
        };
        let severity = if health < 30.0 {
            Severity::Critical
        } else if health < 50.0 {
            Severity::High
        } else if health < 70.0 {
            Severity::Medium
        } else {
            Severity::Low
        };

        vec![finding(
            self.kind(),
            "system",
            severity,
            format!("System Health Score: {:.1}%", health),
            "Overall system health based on resource utilization",
            "Address high-priority issues first to improve system health",
            85.0,
        )
        .with_evidence("health_score", health)]
    }
}

/// Analysis source driving a single rule-based role
pub struct RuleBasedAgent {
    name: String,
    role: Box<dyn AgentRole>,
}

impl RuleBasedAgent {
    pub fn new(kind: RoleKind) -> Self {
        Self {
            name: format!("{}_agent", kind),
            role: kind.role(),
        }
    }

    pub fn kind(&self) -> RoleKind {
        self.role.kind()
    }
}

#[async_trait]
impl AnalysisSource for RuleBasedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Insight>> {
        let mut insights = self.role.evaluate(&input.snapshot);
        for insight in &mut insights {
            insight.source = self.name.clone();
        }
        Ok(insights)
    }
}
