//! Performance insight engine library
//!
//! This crate provides the core functionality for:
//! - USE Method scoring of resource snapshots
//! - Latency distribution analysis
//! - Bottleneck detection and prioritization
//! - Multi-source consensus aggregation
//! - In-memory insight queries
//! - Observability (structured logging and Prometheus metrics)

pub mod analysis;
pub mod collector;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod error;
pub mod models;
pub mod observability;
pub mod query;
pub mod sources;
pub mod thresholds;

pub use collector::{FileCollector, MetricsCollector, SnapshotCache};
pub use config::{EngineConfig, SourceConfig};
pub use consensus::{ConsensusAggregator, SourceContribution, SourceOutcome};
pub use engine::{AnalysisInput, PerformanceEngine, PerformanceEngineBuilder};
pub use error::{EngineError, Result};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use query::{InsightFilter, InsightQuery, InsightSummary, QueryResult};
pub use sources::AnalysisSource;
pub use thresholds::{Threshold, ThresholdCatalog};
