//! Running token and cost totals fed by provider call outcomes

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::usage::{CallOutcome, PricingTable, UsageObserver};
use crate::infrastructure::observability::metrics::{record_provider_call, record_spend};

/// Snapshot of everything the accountant has seen since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub requests: u64,
    pub failures: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Calls whose token counts were estimated from text length
    pub approximate_calls: u64,
    pub cost_micro_usd: u64,
}

impl UsageTotals {
    pub fn cost_usd(&self) -> f64 {
        self.cost_micro_usd as f64 / 1_000_000.0
    }
}

/// Default [`UsageObserver`]: prices each call, emits Prometheus counters and
/// keeps process-wide totals.
#[derive(Debug, Default)]
pub struct CostAccountant {
    pricing: PricingTable,
    requests: AtomicU64,
    failures: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    approximate_calls: AtomicU64,
    cost_micro_usd: AtomicU64,
}

impl CostAccountant {
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            ..Default::default()
        }
    }

    pub fn totals(&self) -> UsageTotals {
        UsageTotals {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            approximate_calls: self.approximate_calls.load(Ordering::Relaxed),
            cost_micro_usd: self.cost_micro_usd.load(Ordering::Relaxed),
        }
    }
}

impl UsageObserver for CostAccountant {
    fn record(&self, outcome: &CallOutcome) {
        self.requests.fetch_add(1, Ordering::Relaxed);

        record_provider_call(outcome);

        if !outcome.success {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                provider = %outcome.provider,
                error_kind = outcome.error_kind.unwrap_or("unknown"),
                attempts = outcome.attempts,
                "Provider call failed"
            );
            return;
        }

        let Some(tokens) = outcome.tokens else {
            return;
        };

        self.prompt_tokens
            .fetch_add(tokens.prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(tokens.completion_tokens as u64, Ordering::Relaxed);
        if tokens.is_approximate() {
            self.approximate_calls.fetch_add(1, Ordering::Relaxed);
        }

        let cost = self.pricing.cost(&outcome.provider, &outcome.model, &tokens);
        self.cost_micro_usd
            .fetch_add((cost * 1_000_000.0).round() as u64, Ordering::Relaxed);
        record_spend(&outcome.provider, &outcome.model, cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::usage::TokenCount;
    use std::time::Duration;

    #[test]
    fn test_cost_for_gpt_35_turbo() {
        let accountant = CostAccountant::default();

        accountant.record(&CallOutcome::succeeded(
            "openai",
            "gpt-3.5-turbo",
            TokenCount::exact(100, 50),
            Duration::from_millis(300),
            1,
        ));

        let totals = accountant.totals();
        let expected = 100.0 * 0.50 / 1e6 + 50.0 * 1.50 / 1e6;
        assert!((totals.cost_usd() - expected).abs() < 1e-9);
        assert_eq!(totals.cost_micro_usd, 125);
        assert_eq!(totals.prompt_tokens, 100);
        assert_eq!(totals.completion_tokens, 50);
        assert_eq!(totals.requests, 1);
    }

    #[test]
    fn test_failures_counted_without_cost() {
        let accountant = CostAccountant::default();

        accountant.record(&CallOutcome::failed(
            "anthropic",
            "claude-3-haiku-20240307",
            "max_retries_exceeded",
            Duration::from_secs(2),
            3,
        ));

        let totals = accountant.totals();
        assert_eq!(totals.requests, 1);
        assert_eq!(totals.failures, 1);
        assert_eq!(totals.cost_micro_usd, 0);
    }

    #[test]
    fn test_approximate_and_unknown_model() {
        let accountant = CostAccountant::default();

        accountant.record(&CallOutcome::succeeded(
            "openai",
            "some-future-model",
            TokenCount::approximate(8, 16),
            Duration::from_millis(10),
            1,
        ));

        let totals = accountant.totals();
        assert_eq!(totals.approximate_calls, 1);
        assert_eq!(totals.prompt_tokens, 8);
        assert_eq!(totals.cost_micro_usd, 0);
    }
}
