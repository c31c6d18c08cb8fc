//! Backtest simulator.
//!
//! Replays stored price history through the same buy-rule path the live loop
//! uses. Nothing is executed: there are no orders, no holdings and no
//! cooldown, only a record of which rule would have fired when.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::domain::error::TraderError;
use crate::domain::price::{PriceRange, PriceSample, prices, window};
use crate::domain::rule::RuleSpec;
use crate::domain::rule_eval::{WindowOutcome, evaluate_window};
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
    pub history_lookback: Duration,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if self.start >= self.end {
            return Err(TraderError::config_invalid(
                "backtest",
                "start",
                "start must be before end",
            ));
        }
        if self.step <= Duration::zero() {
            return Err(TraderError::config_invalid(
                "backtest",
                "step_minutes",
                "step must be positive",
            ));
        }
        if self.history_lookback <= Duration::zero() {
            return Err(TraderError::config_invalid(
                "engine",
                "history_lookback_minutes",
                "lookback must be positive",
            ));
        }
        Ok(())
    }

    /// Simulated clock ticks from `start` to `end` inclusive.
    pub fn steps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        std::iter::successors(Some(self.start), move |t| Some(*t + self.step))
            .take_while(move |t| *t <= self.end)
    }
}

/// A buy rule that would have fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub rule_id: String,
    pub rule_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestReport {
    pub firings: Vec<Firing>,
    /// Steps with enough history to evaluate, per ticker.
    pub steps_evaluated: BTreeMap<String, usize>,
    /// Steps skipped for missing or short history, per ticker.
    pub steps_skipped: BTreeMap<String, usize>,
}

impl BacktestReport {
    pub fn firings_for(&self, ticker: &str) -> impl Iterator<Item = &Firing> {
        self.firings.iter().filter(move |f| f.ticker == ticker)
    }
}

pub fn run_backtest(
    market: &dyn MarketDataPort,
    watchlist: &[String],
    buy_rules: &[RuleSpec],
    config: &BacktestConfig,
) -> Result<BacktestReport, TraderError> {
    config.validate()?;
    info!(
        start = %config.start,
        end = %config.end,
        step_minutes = config.step.num_minutes(),
        tickers = watchlist.len(),
        rules = buy_rules.len(),
        "backtest started"
    );

    let fetch_range = PriceRange::new(config.start - config.history_lookback, config.end);
    let mut report = BacktestReport::default();

    for ticker in watchlist {
        let series = match market.historical_prices(ticker, &fetch_range) {
            Ok(series) => series,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "no history for ticker; skipping");
                continue;
            }
        };
        replay_ticker(ticker, &series, buy_rules, config, &mut report);
    }

    info!(
        firings = report.firings.len(),
        evaluated = report.steps_evaluated.values().sum::<usize>(),
        "backtest finished"
    );
    Ok(report)
}

fn replay_ticker(
    ticker: &str,
    series: &[PriceSample],
    buy_rules: &[RuleSpec],
    config: &BacktestConfig,
    report: &mut BacktestReport,
) {
    let mut evaluated = 0usize;
    let mut skipped = 0usize;

    for t in config.steps() {
        let samples = window(series, &PriceRange::trailing(t, config.history_lookback));
        let Some(last) = samples.last() else {
            skipped += 1;
            continue;
        };
        let history = prices(samples);
        match evaluate_window(buy_rules, last.price, &history, None) {
            WindowOutcome::InsufficientHistory { have, need } => {
                debug!(ticker, %t, have, need, "window too short");
                skipped += 1;
            }
            WindowOutcome::NoSignal => evaluated += 1,
            WindowOutcome::Fired(rule) => {
                evaluated += 1;
                debug!(ticker, %t, rule = %rule.id, price = last.price, "rule fired");
                report.firings.push(Firing {
                    ticker: ticker.to_string(),
                    timestamp: t,
                    price: last.price,
                    rule_id: rule.id.clone(),
                    rule_type: rule.type_tag().to_string(),
                });
            }
        }
    }

    report.steps_evaluated.insert(ticker.to_string(), evaluated);
    report.steps_skipped.insert(ticker.to_string(), skipped);
}
