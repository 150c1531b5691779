//! In-process sources wrapping the pure analyzers

use super::AnalysisSource;
use crate::analysis::bottleneck::BOTTLENECK_SOURCE;
use crate::analysis::latency::LATENCY_SOURCE;
use crate::analysis::use_method::USE_SOURCE;
use crate::analysis::{BottleneckDetector, LatencyAnalyzer, UseAnalyzer};
use crate::engine::AnalysisInput;
use crate::error::Result;
use crate::models::Insight;
use crate::thresholds::ThresholdCatalog;
use async_trait::async_trait;
use std::sync::Arc;

pub struct UseMethodSource {
    analyzer: UseAnalyzer,
}

impl UseMethodSource {
    pub fn new(thresholds: Arc<ThresholdCatalog>) -> Self {
        Self {
            analyzer: UseAnalyzer::new(thresholds),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.analyzer = self.analyzer.with_verbose(verbose);
        self
    }
}

#[async_trait]
impl AnalysisSource for UseMethodSource {
    fn name(&self) -> &str {
        USE_SOURCE
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Insight>> {
        Ok(self.analyzer.analyze(&input.snapshot).insights)
    }
}

#[derive(Default)]
pub struct BottleneckSource {
    detector: BottleneckDetector,
}

impl BottleneckSource {
    pub fn new(detector: BottleneckDetector) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl AnalysisSource for BottleneckSource {
    fn name(&self) -> &str {
        BOTTLENECK_SOURCE
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Insight>> {
        Ok(self.detector.detect(&input.snapshot))
    }
}

#[derive(Default)]
pub struct LatencySource {
    analyzer: LatencyAnalyzer,
}

impl LatencySource {
    pub fn with_percentiles(percentiles: Vec<f64>) -> Result<Self> {
        Ok(Self {
            analyzer: LatencyAnalyzer::new().with_percentiles(percentiles)?,
        })
    }
}

#[async_trait]
impl AnalysisSource for LatencySource {
    fn name(&self) -> &str {
        LATENCY_SOURCE
    }

    /// No samples means nothing to say; a batch with no usable samples is an error
    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Insight>> {
        if input.latency_samples.is_empty() {
            return Ok(Vec::new());
        }
        let report = self.analyzer.analyze(&input.latency_samples)?;
        Ok(vec![self.analyzer.insight(&report)])
    }
}
