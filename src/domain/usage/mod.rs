//! Cost and token accounting

mod observer;
mod pricing;
mod tokens;

pub use observer::{CallOutcome, UsageObserver};
pub use pricing::{default_model_pricing, ModelPricing, PricingTable};
pub use tokens::{TokenCount, TokenCounter};

#[cfg(test)]
pub use observer::MockUsageObserver;
