//! HTTP middleware

pub mod logging;
pub mod metrics;

pub use logging::{logging_middleware, truncate_for_log};
pub use metrics::metrics_middleware;
