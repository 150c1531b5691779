//! Error taxonomy for the insight engine
//!
//! Only [`EngineError::EmptyInput`] is expected to reach callers of the
//! analyzers. Every other variant is recovered inside the engine and turned
//! into insight content or an empty source contribution.

use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A resource or field is absent from the snapshot
    #[error("missing data for {resource}: {field}")]
    MissingData { resource: String, field: String },

    /// Scoring a resource or running a source failed
    #[error("analysis of {target} failed: {message}")]
    AnalysisFailure { target: String, message: String },

    /// Analyzer was handed zero usable samples
    #[error("no data: {0}")]
    EmptyInput(String),

    /// A remote analysis source exceeded its time budget
    #[error("source {source_name} timed out after {}ms", .budget.as_millis())]
    SourceTimeout { source_name: String, budget: Duration },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn analysis(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AnalysisFailure {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn missing(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingData {
            resource: resource.into(),
            field: field.into(),
        }
    }

    /// Stable code used as a log field and metrics label
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::MissingData { .. } => "missing_data",
            EngineError::AnalysisFailure { .. } => "analysis_failure",
            EngineError::EmptyInput(_) => "empty_input",
            EngineError::SourceTimeout { .. } => "source_timeout",
            EngineError::InvalidConfig(_) => "invalid_config",
            EngineError::Http(_) => "http_error",
            EngineError::Parse(_) => "parse_error",
            EngineError::Io(_) => "io_error",
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}
