//! Consensus aggregation
//!
//! Merges the insight lists of every source into one ranked report with a
//! consensus score, prioritized recommendations and next steps.

use crate::analysis::bottleneck::component_rank;
use crate::models::{ConsensusReport, Insight, Severity, SourceStatus, SourceSummary};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Default cap on report recommendations
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 10;

/// Insights per severity tier quoted in the recommendations
const TOP_PER_TIER: usize = 3;

const CRITICAL_MARKER: &str = "IMMEDIATE ACTION REQUIRED: address critical performance issues";
const HIGH_MARKER: &str = "HIGH PRIORITY: address these issues soon";

const GENERAL_RECOMMENDATIONS: [&str; 5] = [
    "Set up automated monitoring and alerting",
    "Implement regular performance reviews",
    "Create performance baselines and track trends",
    "Review security configurations regularly",
    "Conduct monthly cost optimization reviews",
];

const GENERAL_NEXT_STEPS: [&str; 5] = [
    "Implement automated monitoring dashboards",
    "Schedule follow-up performance analysis in 24 hours",
    "Create implementation roadmap for all recommendations",
    "Document performance baselines for future comparison",
    "Review and update SLA requirements based on findings",
];

/// What a source produced in one pass
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Insights(Vec<Insight>),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceContribution {
    pub source: String,
    pub outcome: SourceOutcome,
}

impl SourceContribution {
    pub fn ok(source: impl Into<String>, insights: Vec<Insight>) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Insights(insights),
        }
    }

    pub fn failed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Failed(reason.into()),
        }
    }

    pub fn timed_out(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::TimedOut,
        }
    }

    fn summary(&self) -> SourceSummary {
        let (status, insight_count, reason) = match &self.outcome {
            SourceOutcome::Insights(list) => (SourceStatus::Ok, list.len(), None),
            SourceOutcome::Failed(reason) => (SourceStatus::Failed, 0, Some(reason.clone())),
            SourceOutcome::TimedOut => (SourceStatus::TimedOut, 0, None),
        };
        SourceSummary {
            name: self.source.clone(),
            status,
            insight_count,
            reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusAggregator {
    /// Denominator of the diversity bonus; defaults to the number of contributions
    expected_sources: Option<usize>,
    max_recommendations: usize,
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self {
            expected_sources: None,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
        }
    }
}

impl ConsensusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected_sources(mut self, expected: usize) -> Self {
        self.expected_sources = Some(expected);
        self
    }

    pub fn with_max_recommendations(mut self, max: usize) -> Self {
        self.max_recommendations = max;
        self
    }

    pub fn aggregate(&self, contributions: Vec<SourceContribution>) -> ConsensusReport {
        let sources: Vec<SourceSummary> = contributions.iter().map(|c| c.summary()).collect();
        let expected = self.expected_sources.unwrap_or(contributions.len());

        let mut contributing = BTreeSet::new();
        let mut insights = Vec::new();
        for contribution in contributions {
            if let SourceOutcome::Insights(list) = contribution.outcome {
                if !list.is_empty() {
                    contributing.insert(contribution.source);
                }
                insights.extend(list);
            }
        }

        rank(&mut insights);

        let consensus_score = consensus_score(&insights, contributing.len(), expected);
        let (recommendations, next_steps) = if insights.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                recommendations(&insights, self.max_recommendations),
                next_steps(&insights),
            )
        };

        let mut counts_by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for insight in &insights {
            *counts_by_severity.entry(insight.severity).or_default() += 1;
        }

        let report = ConsensusReport {
            session_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            insights,
            consensus_score,
            recommendations,
            next_steps,
            sources,
            counts_by_severity,
        };

        info!(
            event = "consensus_aggregated",
            session_id = %report.session_id,
            insights = report.insights.len(),
            sources = report.sources.len(),
            contributing = contributing.len(),
            score = report.consensus_score,
            "Consensus report ready"
        );

        report
    }
}

/// Priority order (severity, component) with higher confidence first on ties
pub fn rank(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        (a.severity.rank(), component_rank(&a.component))
            .cmp(&(b.severity.rank(), component_rank(&b.component)))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
}

/// `min(avg_confidence + diversity_bonus + severity_bonus, 100)`, 0 for no insights
pub fn consensus_score(insights: &[Insight], distinct_sources: usize, expected_sources: usize) -> f64 {
    if insights.is_empty() {
        return 0.0;
    }
    let n = insights.len() as f64;
    let avg_confidence = insights.iter().map(|i| i.confidence).sum::<f64>() / n;
    let diversity_bonus = if expected_sources == 0 {
        0.0
    } else {
        (distinct_sources as f64 / expected_sources as f64).min(1.0) * 15.0
    };
    let severity_bonus = insights.iter().map(|i| i.severity.weight()).sum::<f64>() / n * 10.0;

    (avg_confidence + diversity_bonus + severity_bonus).min(100.0)
}

fn headline(insight: &Insight) -> String {
    let text = insight
        .recommendations
        .first()
        .map(String::as_str)
        .unwrap_or(insight.title.as_str());
    format!("- {}", text)
}

fn recommendations(insights: &[Insight], max: usize) -> Vec<String> {
    let mut out = Vec::new();

    for (severity, marker) in [(Severity::Critical, CRITICAL_MARKER), (Severity::High, HIGH_MARKER)] {
        let tier: Vec<&Insight> = insights.iter().filter(|i| i.severity == severity).collect();
        if tier.is_empty() {
            continue;
        }
        out.push(marker.to_string());
        out.extend(tier.into_iter().take(TOP_PER_TIER).map(headline));
    }

    out.extend(GENERAL_RECOMMENDATIONS.iter().map(|s| s.to_string()));
    out.truncate(max);
    out
}

fn next_steps(insights: &[Insight]) -> Vec<String> {
    let critical = insights.iter().filter(|i| i.severity == Severity::Critical).count();
    let high = insights.iter().filter(|i| i.severity == Severity::High).count();

    let mut out = Vec::new();
    if critical > 0 {
        out.push(format!("Address {} critical issues within 24 hours", critical));
    }
    if high > 0 {
        out.push(format!(
            "Plan remediation for {} high-priority issues within 1 week",
            high
        ));
    }
    out.extend(GENERAL_NEXT_STEPS.iter().map(|s| s.to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(source: &str, component: &str, severity: Severity, confidence: f64) -> Insight {
        Insight::new(source, component, severity, format!("{} issue", component), "observed")
            .with_confidence(confidence)
            .with_recommendations([format!("fix {}", component)])
    }

    #[test]
    fn test_failed_source_contributes_nothing() {
        let report = ConsensusAggregator::new().aggregate(vec![
            SourceContribution::ok("a", vec![insight("a", "cpu", Severity::High, 80.0)]),
            SourceContribution::ok("b", vec![insight("b", "memory", Severity::High, 80.0)]),
            SourceContribution::failed("c", "connection refused"),
        ]);

        // 80 + (2/3)*15 + 1.2*10 = 102, clamped
        assert_eq!(report.consensus_score, 100.0);
        assert_eq!(report.insights.len(), 2);
        assert_eq!(report.sources.len(), 3);
        assert_eq!(report.sources[2].status, SourceStatus::Failed);
        assert_eq!(report.sources[2].reason.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_score_clamped_at_100() {
        // 92 + 15 + 12 = 119
        let insights = vec![insight("a", "cpu", Severity::High, 92.0)];
        assert_eq!(consensus_score(&insights, 1, 1), 100.0);
    }

    #[test]
    fn test_score_components() {
        let insights = vec![
            insight("a", "cpu", Severity::Info, 40.0),
            insight("b", "memory", Severity::Low, 20.0),
        ];
        // 30 + (2/4)*15 + 0.65*10 = 44
        let score = consensus_score(&insights, 2, 4);
        assert!((score - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report() {
        let report = ConsensusAggregator::new().aggregate(vec![
            SourceContribution::timed_out("llm"),
            SourceContribution::ok("a", vec![]),
        ]);
        assert_eq!(report.consensus_score, 0.0);
        assert!(report.recommendations.is_empty());
        assert!(report.next_steps.is_empty());
        assert_eq!(report.counts_by_severity.len(), 5);
        assert_eq!(report.sources[0].status, SourceStatus::TimedOut);
    }

    #[test]
    fn test_recommendations_layout() {
        let report = ConsensusAggregator::new().aggregate(vec![SourceContribution::ok(
            "a",
            vec![
                insight("a", "cpu", Severity::Critical, 90.0),
                insight("a", "memory", Severity::Critical, 90.0),
                insight("a", "disk", Severity::Critical, 90.0),
                insight("a", "network", Severity::Critical, 90.0),
                insight("a", "latency", Severity::High, 90.0),
            ],
        )]);

        let recs = &report.recommendations;
        assert_eq!(recs.len(), 10);
        assert_eq!(recs[0], CRITICAL_MARKER);
        assert_eq!(recs[1], "- fix cpu");
        assert_eq!(recs[3], "- fix disk");
        assert_eq!(recs[4], HIGH_MARKER);
        assert_eq!(recs[5], "- fix latency");
        assert_eq!(recs[6], GENERAL_RECOMMENDATIONS[0]);

        assert_eq!(report.next_steps[0], "Address 4 critical issues within 24 hours");
        assert_eq!(
            report.next_steps[1],
            "Plan remediation for 1 high-priority issues within 1 week"
        );
        assert_eq!(report.next_steps.len(), 7);
    }

    #[test]
    fn test_general_tail_only_without_urgent_findings() {
        let report = ConsensusAggregator::new().aggregate(vec![SourceContribution::ok(
            "a",
            vec![insight("a", "cost", Severity::Low, 70.0)],
        )]);
        assert_eq!(report.recommendations.len(), 5);
        assert_eq!(report.next_steps.len(), 5);
    }

    #[test]
    fn test_ranking_and_counts() {
        let report = ConsensusAggregator::new().aggregate(vec![
            SourceContribution::ok(
                "a",
                vec![
                    insight("a", "network", Severity::High, 60.0),
                    insight("a", "cpu", Severity::Medium, 90.0),
                ],
            ),
            SourceContribution::ok(
                "b",
                vec![
                    insight("b", "network", Severity::High, 95.0),
                    insight("b", "memory", Severity::Critical, 50.0),
                ],
            ),
        ]);

        let order: Vec<_> = report
            .insights
            .iter()
            .map(|i| (i.component.as_str(), i.confidence))
            .collect();
        assert_eq!(
            order,
            vec![("memory", 50.0), ("network", 95.0), ("network", 60.0), ("cpu", 90.0)]
        );
        assert_eq!(report.counts_by_severity[&Severity::High], 2);
        assert_eq!(report.counts_by_severity[&Severity::Info], 0);
    }

    #[test]
    fn test_expected_sources_override() {
        let report = ConsensusAggregator::new()
            .with_expected_sources(10)
            .aggregate(vec![SourceContribution::ok(
                "a",
                vec![insight("a", "cpu", Severity::Medium, 50.0)],
            )]);
        // 50 + 1.5 + 10
        assert!((report.consensus_score - 61.5).abs() < 1e-9);
    }
}
