//! OTLP tracing and Prometheus metrics

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use metrics::{create_metrics_router, init_metrics, PrometheusMetrics};
pub use tracing_setup::{init_tracing, shutdown_tracing};
