//! Immutable engine configuration, built once at startup.

use chrono::Duration;

use crate::domain::cooldown::CooldownScope;
use crate::domain::rule::{RuleSpec, required_history};

pub const DEFAULT_PORTFOLIO: &str = "default";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub watchlist: Vec<String>,
    pub allocation_usd: f64,
    pub buy_rules: Vec<RuleSpec>,
    pub sell_rules: Vec<RuleSpec>,
    pub cooldown: Duration,
    pub cooldown_scope: CooldownScope,
    pub poll_interval: std::time::Duration,
    pub history_lookback: Duration,
    pub portfolio_id: String,
}

impl EngineConfig {
    /// Longest history window any buy rule needs.
    pub fn buy_window(&self) -> usize {
        required_history(&self.buy_rules)
    }

    /// Longest history window any sell rule needs.
    pub fn sell_window(&self) -> usize {
        required_history(&self.sell_rules)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            watchlist: Vec::new(),
            allocation_usd: 10.0,
            buy_rules: Vec::new(),
            sell_rules: Vec::new(),
            cooldown: Duration::minutes(60),
            cooldown_scope: CooldownScope::Global,
            poll_interval: std::time::Duration::from_secs(60),
            history_lookback: Duration::minutes(1500),
            portfolio_id: DEFAULT_PORTFOLIO.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{RawRule, RuleSpec};

    fn rule(type_tag: &str, params: &[(&str, f64)]) -> RuleSpec {
        RuleSpec::from_raw(&RawRule {
            id: type_tag.into(),
            description: String::new(),
            type_tag: type_tag.into(),
            params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
        .unwrap()
    }

    #[test]
    fn windows_follow_rules() {
        let config = EngineConfig {
            buy_rules: vec![rule("sma_dip_percentage", &[("period", 1440.0), ("percent_below", 5.0)])],
            sell_rules: vec![
                rule("profit_percentage_target", &[("percent_above", 5.0)]),
                rule("roc_spike", &[("roc_period", 30.0), ("spike_trigger", 3.0)]),
            ],
            ..EngineConfig::default()
        };
        assert_eq!(config.buy_window(), 1440);
        assert_eq!(config.sell_window(), 31);
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cooldown_scope, CooldownScope::Global);
        assert_eq!(config.portfolio_id, DEFAULT_PORTFOLIO);
        assert_eq!(config.buy_window(), 0);
    }
}
