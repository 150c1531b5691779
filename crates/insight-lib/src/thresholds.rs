//! Threshold catalog for USE Method scoring
//!
//! Warning/critical limits per resource for utilization, saturation and
//! errors. The catalog is built once at startup and shared read-only.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Limits for one resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning_utilization: f64,
    pub critical_utilization: f64,
    pub warning_saturation: f64,
    pub critical_saturation: f64,
    pub warning_errors: f64,
    pub critical_errors: f64,
}

impl Threshold {
    pub const fn new(
        warning_utilization: f64,
        critical_utilization: f64,
        warning_saturation: f64,
        critical_saturation: f64,
    ) -> Self {
        Self {
            warning_utilization,
            critical_utilization,
            warning_saturation,
            critical_saturation,
            warning_errors: 0.0,
            critical_errors: 0.0,
        }
    }

    pub fn with_errors(mut self, warning: f64, critical: f64) -> Self {
        self.warning_errors = warning;
        self.critical_errors = critical;
        self
    }

    fn validate(&self, resource: &str) -> Result<()> {
        let pairs = [
            ("utilization", self.warning_utilization, self.critical_utilization),
            ("saturation", self.warning_saturation, self.critical_saturation),
            ("errors", self.warning_errors, self.critical_errors),
        ];
        for (kind, warning, critical) in pairs {
            if !warning.is_finite() || !critical.is_finite() || warning < 0.0 || critical < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{} {} limits must be finite and non-negative",
                    resource, kind
                )));
            }
            if warning > critical {
                return Err(EngineError::InvalidConfig(format!(
                    "{} {} warning limit {} exceeds critical limit {}",
                    resource, kind, warning, critical
                )));
            }
        }
        Ok(())
    }
}

/// Partial override of a [`Threshold`], as read from configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverride {
    pub warning_utilization: Option<f64>,
    pub critical_utilization: Option<f64>,
    pub warning_saturation: Option<f64>,
    pub critical_saturation: Option<f64>,
    pub warning_errors: Option<f64>,
    pub critical_errors: Option<f64>,
}

impl ThresholdOverride {
    fn apply(&self, base: Threshold) -> Threshold {
        Threshold {
            warning_utilization: self.warning_utilization.unwrap_or(base.warning_utilization),
            critical_utilization: self
                .critical_utilization
                .unwrap_or(base.critical_utilization),
            warning_saturation: self.warning_saturation.unwrap_or(base.warning_saturation),
            critical_saturation: self.critical_saturation.unwrap_or(base.critical_saturation),
            warning_errors: self.warning_errors.unwrap_or(base.warning_errors),
            critical_errors: self.critical_errors.unwrap_or(base.critical_errors),
        }
    }
}

/// Per-resource limits keyed by resource name (`cpu`, `memory`, `disk`, `network`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCatalog {
    thresholds: BTreeMap<String, Threshold>,
    /// Unit the limits are expressed in
    pub unit: String,
}

impl ThresholdCatalog {
    pub fn empty() -> Self {
        Self {
            thresholds: BTreeMap::new(),
            unit: "%".to_string(),
        }
    }

    /// Look up limits for a resource; `disk:sda` falls back to `disk`
    pub fn get(&self, resource: &str) -> Option<&Threshold> {
        self.thresholds.get(resource).or_else(|| {
            resource
                .split_once(':')
                .and_then(|(family, _)| self.thresholds.get(family))
        })
    }

    pub fn insert(&mut self, resource: impl Into<String>, threshold: Threshold) -> Result<()> {
        let resource = resource.into();
        threshold.validate(&resource)?;
        self.thresholds.insert(resource, threshold);
        Ok(())
    }

    /// Apply configured overrides on top of this catalog
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, ThresholdOverride>) -> Result<Self> {
        for (resource, patch) in overrides {
            let base = self
                .thresholds
                .get(resource)
                .copied()
                .unwrap_or(Threshold::new(0.0, 0.0, 0.0, 0.0));
            self.insert(resource.clone(), patch.apply(base))?;
        }
        Ok(self)
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.thresholds.keys().map(String::as_str)
    }
}

impl Default for ThresholdCatalog {
    fn default() -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert("cpu".to_string(), Threshold::new(70.0, 90.0, 20.0, 100.0));
        thresholds.insert("memory".to_string(), Threshold::new(80.0, 95.0, 10.0, 50.0));
        thresholds.insert("disk".to_string(), Threshold::new(60.0, 85.0, 30.0, 60.0));
        thresholds.insert("network".to_string(), Threshold::new(70.0, 90.0, 15.0, 30.0));
        Self {
            thresholds,
            unit: "%".to_string(),
        }
    }
}
