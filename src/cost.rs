//! Inference cost bookkeeping
//!
//! Best-effort token and USD accounting for the inference provider, with daily
//! totals that reset at UTC midnight and lifetime totals that never reset.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub type SharedCosts = Arc<RwLock<CostTracker>>;

/// USD per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
}

const fn pricing(input: f64, output: f64) -> Pricing {
    Pricing { input, output }
}

/// Ordered most specific first; matched by substring of the normalised model name.
const PRICING_TABLE: &[(&str, Pricing)] = &[
    ("gpt-5-nano", pricing(0.05, 0.4)),
    ("gpt-5-mini", pricing(0.25, 2.0)),
    ("gpt-5", pricing(1.25, 10.0)),
    ("gpt-4.1-nano", pricing(0.1, 0.4)),
    ("gpt-4.1-mini", pricing(0.4, 1.6)),
    ("gpt-4.1", pricing(2.0, 8.0)),
    ("gpt-4o-mini", pricing(0.6, 2.4)),
    ("gpt-4o", pricing(5.0, 20.0)),
    ("gpt-4-turbo", pricing(10.0, 30.0)),
    ("gpt-3.5-turbo", pricing(0.5, 1.5)),
];

const DEFAULT_PRICING: Pricing = pricing(0.1, 0.4);

/// Looks up the price of `model`, falling back to the cheapest tier.
pub fn pricing_for(model: &str) -> Pricing {
    let normalized = model.to_ascii_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| normalized.contains(name))
        .map(|(_, price)| *price)
        .unwrap_or_else(|| {
            warn!(model, "unknown model pricing, using default");
            DEFAULT_PRICING
        })
}

/// Token counts reported by the inference provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTotals {
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl CostTotals {
    fn add(&mut self, usage: TokenUsage, cost: f64) {
        self.cost_usd += cost;
        self.input_tokens += usage.prompt_tokens;
        self.output_tokens += usage.completion_tokens;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostStatus {
    pub daily: CostTotals,
    pub lifetime: CostTotals,
    pub reset_time: DateTime<Utc>,
}

// == Cost Tracker ==
#[derive(Debug)]
pub struct CostTracker {
    daily: CostTotals,
    lifetime: CostTotals,
    reset_at: DateTime<Utc>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CostTracker {
    pub fn new() -> Self {
        Self {
            daily: CostTotals::default(),
            lifetime: CostTotals::default(),
            reset_at: next_reset(Utc::now()),
        }
    }

    pub fn shared(self) -> SharedCosts {
        Arc::new(RwLock::new(self))
    }

    /// Charges one call and returns its cost in USD.
    pub fn record(&mut self, model: &str, usage: TokenUsage, operation: &str) -> f64 {
        self.roll_over_if_due(Utc::now());

        let price = pricing_for(model);
        let cost = usage.prompt_tokens as f64 / 1_000_000.0 * price.input
            + usage.completion_tokens as f64 / 1_000_000.0 * price.output;

        self.daily.add(usage, cost);
        self.lifetime.add(usage, cost);

        info!(
            operation,
            model,
            tokens = usage.total(),
            cost_usd = cost,
            daily_cost_usd = self.daily.cost_usd,
            "inference cost recorded"
        );
        cost
    }

    pub fn status(&mut self) -> CostStatus {
        self.roll_over_if_due(Utc::now());
        CostStatus {
            daily: self.daily,
            lifetime: self.lifetime,
            reset_time: self.reset_at,
        }
    }

    fn roll_over_if_due(&mut self, now: DateTime<Utc>) {
        if now >= self.reset_at {
            info!(
                previous_cost_usd = self.daily.cost_usd,
                "daily inference cost reset"
            );
            self.daily = CostTotals::default();
            self.reset_at = next_reset(now);
        }
    }
}

fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(now.date_naive());
    tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_prefers_most_specific_match() {
        assert_eq!(pricing_for("gpt-4.1-nano"), pricing(0.1, 0.4));
        assert_eq!(pricing_for("GPT-4.1-mini-2025"), pricing(0.4, 1.6));
        assert_eq!(pricing_for("gpt-4o-mini"), pricing(0.6, 2.4));
        assert_eq!(pricing_for("gpt-5"), pricing(1.25, 10.0));
        assert_eq!(pricing_for("mystery-model"), DEFAULT_PRICING);
    }

    #[test]
    fn test_record_accumulates_daily_and_lifetime() {
        let mut tracker = CostTracker::new();
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 500_000,
        };

        let cost = tracker.record("gpt-4.1", usage, "analysis");
        assert!((cost - 6.0).abs() < 1e-9);

        tracker.record("gpt-4.1", usage, "analysis");
        let status = tracker.status();
        assert!((status.daily.cost_usd - 12.0).abs() < 1e-9);
        assert_eq!(status.lifetime.input_tokens, 2_000_000);
    }

    #[test]
    fn test_daily_totals_reset_but_lifetime_does_not() {
        let mut tracker = CostTracker::new();
        tracker.record("gpt-4.1-nano", TokenUsage { prompt_tokens: 10, completion_tokens: 10 }, "x");

        tracker.reset_at = Utc::now() - chrono::Duration::seconds(1);
        let status = tracker.status();

        assert_eq!(status.daily, CostTotals::default());
        assert_eq!(status.lifetime.input_tokens, 10);
    }
}
