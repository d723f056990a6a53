//! Model pricing configuration

use serde::{Deserialize, Serialize};

use super::TokenCount;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Pricing for a model family, in USD per million tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model id prefix this pricing applies to (dated snapshots share the prefix)
    pub model_prefix: String,
    /// Provider name
    pub provider: String,
    /// Price per million input (prompt) tokens
    pub input_per_million: f64,
    /// Price per million output (completion) tokens
    pub output_per_million: f64,
}

impl ModelPricing {
    pub fn new(
        model_prefix: impl Into<String>,
        provider: impl Into<String>,
        input_per_million: f64,
        output_per_million: f64,
    ) -> Self {
        Self {
            model_prefix: model_prefix.into(),
            provider: provider.into(),
            input_per_million,
            output_per_million,
        }
    }

    /// Calculate cost in USD for given token counts
    pub fn calculate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let input_cost = prompt_tokens as f64 * self.input_per_million / TOKENS_PER_MILLION;
        let output_cost = completion_tokens as f64 * self.output_per_million / TOKENS_PER_MILLION;

        input_cost + output_cost
    }

    fn matches(&self, provider: &str, model: &str) -> bool {
        self.provider.eq_ignore_ascii_case(provider) && model.starts_with(&self.model_prefix)
    }
}

/// Per-model pricing table with longest-prefix lookup
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: Vec<ModelPricing>,
}

impl PricingTable {
    pub fn new(entries: Vec<ModelPricing>) -> Self {
        Self { entries }
    }

    /// Add or replace pricing for a model prefix
    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.entries.retain(|p| {
            !(p.model_prefix == pricing.model_prefix
                && p.provider.eq_ignore_ascii_case(&pricing.provider))
        });
        self.entries.push(pricing);
        self
    }

    /// Finds the pricing whose prefix is the longest match for the model id
    pub fn lookup(&self, provider: &str, model: &str) -> Option<&ModelPricing> {
        self.entries
            .iter()
            .filter(|p| p.matches(provider, model))
            .max_by_key(|p| p.model_prefix.len())
    }

    /// Cost in USD; unknown models cost nothing
    pub fn cost(&self, provider: &str, model: &str, tokens: &TokenCount) -> f64 {
        match self.lookup(provider, model) {
            Some(pricing) => pricing.calculate_cost(tokens.prompt_tokens, tokens.completion_tokens),
            None => {
                tracing::debug!(provider = %provider, model = %model, "No pricing for model");
                0.0
            }
        }
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new(default_model_pricing())
    }
}

/// Built-in list prices
pub fn default_model_pricing() -> Vec<ModelPricing> {
    vec![
        // OpenAI
        ModelPricing::new("gpt-4o", "openai", 2.50, 10.00),
        ModelPricing::new("gpt-4o-mini", "openai", 0.15, 0.60),
        ModelPricing::new("gpt-4-turbo", "openai", 10.00, 30.00),
        ModelPricing::new("gpt-4", "openai", 30.00, 60.00),
        ModelPricing::new("gpt-3.5-turbo", "openai", 0.50, 1.50),
        // Anthropic
        ModelPricing::new("claude-3-5-sonnet", "anthropic", 3.00, 15.00),
        ModelPricing::new("claude-3-opus", "anthropic", 15.00, 75.00),
        ModelPricing::new("claude-3-haiku", "anthropic", 0.25, 1.25),
    ]
}
