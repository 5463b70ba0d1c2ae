//! Model pricing used to cost agent calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

impl ModelRates {
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.input / 1_000_000.0
            + output_tokens as f64 * self.output / 1_000_000.0
    }
}

/// Rates for models without an entry.
pub const DEFAULT_RATES: ModelRates = ModelRates::new(3.0, 15.0);

const BUILTIN_RATES: [(&str, ModelRates); 5] = [
    ("claude-opus-4-20250514", ModelRates::new(15.0, 75.0)),
    ("claude-sonnet-4-20250514", ModelRates::new(3.0, 15.0)),
    ("claude-3-5-sonnet-20241022", ModelRates::new(3.0, 15.0)),
    ("claude-3-5-haiku-20241022", ModelRates::new(0.80, 4.0)),
    ("claude-3-haiku-20240307", ModelRates::new(0.25, 1.25)),
];

#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    default: ModelRates,
    models: BTreeMap<String, ModelRates>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            default: DEFAULT_RATES,
            models: BUILTIN_RATES
                .iter()
                .map(|(model, rates)| (model.to_string(), *rates))
                .collect(),
        }
    }
}

impl PricingTable {
    /// Add or replace the rates for one model.
    pub fn with_rates(mut self, model: impl Into<String>, rates: ModelRates) -> Self {
        self.models.insert(model.into(), rates);
        self
    }

    pub fn with_overrides(mut self, overrides: &BTreeMap<String, ModelRates>) -> Self {
        for (model, rates) in overrides {
            self.models.insert(model.clone(), *rates);
        }
        self
    }

    pub fn rates_for(&self, model: &str) -> ModelRates {
        self.models.get(model).copied().unwrap_or(self.default)
    }

    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.rates_for(model).cost(input_tokens, output_tokens)
    }
}
