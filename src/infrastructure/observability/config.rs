//! `observability` configuration section

use serde::Deserialize;

use crate::domain::DomainError;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub tracing: TracingConfig,
    pub metrics: MetricsConfig,
}

/// OTLP span export; off unless `observability.tracing.enabled`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    pub otlp_endpoint: String,
    pub service_name: String,
    /// Fraction of root spans exported, 0.0 to 1.0
    pub sampling_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: env!("CARGO_PKG_NAME").to_string(),
            sampling_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route serving the Prometheus text format
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.tracing.sampling_ratio) {
            return Err(DomainError::configuration(format!(
                "observability.tracing.sampling_ratio must be between 0.0 and 1.0, got {}",
                self.tracing.sampling_ratio
            )));
        }

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(DomainError::configuration(format!(
                "observability.metrics.path must start with '/', got '{}'",
                self.metrics.path
            )));
        }

        // Would shadow the gateway's own routes
        if self.metrics.enabled && self.metrics.path.starts_with("/v1/") {
            return Err(DomainError::configuration(
                "observability.metrics.path must not live under /v1/",
            ));
        }

        Ok(())
    }
}
