//! Pure analyzers over a single snapshot or latency batch
//!
//! Each analyzer is deterministic and side-effect free apart from logging,
//! so they can run on any task without coordination.

pub mod bottleneck;
pub mod latency;
pub mod use_method;

pub use bottleneck::{component_rank, prioritize, BottleneckDetector};
pub use latency::{percentile, LatencyAnalyzer, LatencyReport, PerformanceClass};
pub use use_method::{UseAnalysis, UseAnalyzer, UseScore, UseStatus};
