//! Spend accounting for advisory calls within one run

use crate::config::PriceTable;
use crate::types::*;
use tracing::debug;

/// Rough characters-per-token ratio for English prompt text
pub const CHARS_PER_TOKEN: usize = 4;

/// Completion length assumed when estimating, capped by `max_tokens`
pub const EXPECTED_OUTPUT_TOKENS: u32 = 300;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Tracks spend against a ceiling. Spend only ever grows.
///
/// Single-threaded by construction: the reranking loop is the only writer.
#[derive(Debug, Clone)]
pub struct CostTracker {
    state: CostState,
    pricing: PriceTable,
    max_tokens: u32,
}

impl CostTracker {
    pub fn new(limit_usd: f64, pricing: PriceTable, max_tokens: u32) -> Self {
        Self {
            state: CostState::new(limit_usd),
            pricing,
            max_tokens,
        }
    }

    /// Estimated USD for one advisory request about `task`
    pub fn estimate(&self, task: &Task, prompt_template: &str, model: &str) -> f64 {
        let input_tokens = estimate_tokens(prompt_template)
            + estimate_tokens(&task.content)
            + task.labels.iter().map(|l| estimate_tokens(l)).sum::<usize>();
        let output_tokens = self.max_tokens.min(EXPECTED_OUTPUT_TOKENS);

        let price = self.pricing.for_model(model);
        let cost = input_tokens as f64 * price.input_per_1k / 1000.0
            + output_tokens as f64 * price.output_per_1k / 1000.0;
        debug!(
            "Estimated {} input + {} output tokens for task {} on {}: ${:.5}",
            input_tokens, output_tokens, task.id, model, cost
        );
        cost
    }

    /// USD for a completed call with known token usage
    pub fn price_usage(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        price_usage(&self.pricing, model, input_tokens, output_tokens)
    }

    pub fn can_afford(&self, estimate: f64) -> bool {
        self.state.spent_usd + estimate <= self.state.limit_usd
    }

    /// Negative or non-finite amounts are ignored
    pub fn record(&mut self, actual_cost: f64) {
        if actual_cost.is_finite() && actual_cost > 0.0 {
            self.state.spent_usd += actual_cost;
        }
    }

    pub fn spent(&self) -> f64 {
        self.state.spent_usd
    }

    pub fn limit(&self) -> f64 {
        self.state.limit_usd
    }

    pub fn state(&self) -> CostState {
        self.state
    }
}

pub fn price_usage(pricing: &PriceTable, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let price = pricing.for_model(model);
    input_tokens as f64 * price.input_per_1k / 1000.0 + output_tokens as f64 * price.output_per_1k / 1000.0
}
