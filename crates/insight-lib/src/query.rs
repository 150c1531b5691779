//! In-memory insight queries
//!
//! Read-only views over a collection of insights, typically the merged list
//! of one or more consensus reports.

use crate::models::{ConsensusReport, Insight, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Filter for [`InsightQuery::query`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightFilter {
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Case-insensitive substring of the component
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl InsightFilter {
    fn matches(&self, insight: &Insight) -> bool {
        self.severity.map_or(true, |s| insight.severity == s)
            && self
                .component
                .as_deref()
                .map_or(true, |c| component_matches(&insight.component, c))
            && self.source.as_deref().map_or(true, |s| insight.source == s)
            && self.since.map_or(true, |t| insight.created_at >= t)
            && self.until.map_or(true, |t| insight.created_at <= t)
    }
}

/// Matching insights plus the count before the limit was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub insights: Vec<Insight>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_component: BTreeMap<String, usize>,
    pub critical: usize,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct InsightQuery {
    insights: Vec<Insight>,
}

impl InsightQuery {
    pub fn new(insights: Vec<Insight>) -> Self {
        Self { insights }
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a ConsensusReport>) -> Self {
        Self {
            insights: reports
                .into_iter()
                .flat_map(|r| r.insights.iter().cloned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.insights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
    }

    /// Newest first, optionally limited
    pub fn all(&self, limit: Option<usize>) -> Vec<Insight> {
        let mut out = newest_first(self.insights.iter());
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<Insight> {
        newest_first(self.insights.iter().filter(|i| i.severity == severity))
    }

    pub fn by_component(&self, component: &str) -> Vec<Insight> {
        newest_first(
            self.insights
                .iter()
                .filter(|i| component_matches(&i.component, component)),
        )
    }

    pub fn critical(&self) -> Vec<Insight> {
        self.by_severity(Severity::Critical)
    }

    /// Insights created within `[start, end]`
    pub fn by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Insight> {
        newest_first(
            self.insights
                .iter()
                .filter(|i| i.created_at >= start && i.created_at <= end),
        )
    }

    /// Count per severity; every level is present, zero when absent
    pub fn count_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for insight in &self.insights {
            *counts.entry(insight.severity).or_default() += 1;
        }
        counts
    }

    pub fn summary(&self) -> InsightSummary {
        let mut by_component = BTreeMap::new();
        for insight in &self.insights {
            *by_component.entry(insight.component.clone()).or_insert(0) += 1;
        }
        let by_severity = self.count_by_severity();

        InsightSummary {
            total: self.insights.len(),
            critical: by_severity[&Severity::Critical],
            by_severity,
            by_component,
            newest: self.insights.iter().map(|i| i.created_at).max(),
        }
    }

    pub fn query(&self, filter: &InsightFilter) -> QueryResult {
        let mut insights = newest_first(self.insights.iter().filter(|i| filter.matches(i)));
        let total = insights.len();
        if let Some(limit) = filter.limit {
            insights.truncate(limit);
        }
        QueryResult { insights, total }
    }
}

fn component_matches(component: &str, needle: &str) -> bool {
    component
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn newest_first<'a>(iter: impl Iterator<Item = &'a Insight>) -> Vec<Insight> {
    let mut out: Vec<Insight> = iter.cloned().collect();
    out.sort_by_key(|i| Reverse(i.created_at));
    out
}
