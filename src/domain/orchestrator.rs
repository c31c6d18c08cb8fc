//! Decision orchestrator: one refresh / buy / sell cycle over the watchlist.
//!
//! The orchestrator owns all mutable engine state (holdings, venue balances,
//! the price snapshot and the cooldown). Indicator, ledger and rule code stay
//! pure and receive that state by reference.
//!
//! A cycle runs:
//! 1. Refresh: venue balances, ledger holdings rebuilt from the event log,
//!    latest prices. A venue or event-log failure aborts the cycle.
//! 2. Buy pass over the watchlist, in order.
//! 3. Sell pass over tickers with a ledger holding the venue corroborates.
//!
//! Each action is gated by the cooldown; the cooldown is armed only after the
//! venue accepts an order.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::domain::cooldown::CooldownState;
use crate::domain::engine_config::EngineConfig;
use crate::domain::error::TraderError;
use crate::domain::ledger::{Holding, compute_holding};
use crate::domain::price::{MarketSnapshot, PriceRange, prices};
use crate::domain::rule::{RuleDirection, RuleSpec};
use crate::domain::rule_eval::{WindowOutcome, evaluate_window};
use crate::domain::trade_event::{TradeEvent, TradeKind};
use crate::ports::event_log_port::EventLogPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::venue_port::{PortfolioBalances, TradeVenue};

/// Mutable state carried between cycles.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub holdings: HashMap<String, Holding>,
    pub balances: PortfolioBalances,
    pub prices: MarketSnapshot,
    pub cooldown: CooldownState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub ticker: String,
    pub kind: TradeKind,
    pub rule_id: String,
    pub quantity: f64,
    pub price: f64,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoPrice,
    InsufficientCash { cash: f64 },
    CooldownActive,
    NotCorroborated,
    NoHistory,
    InsufficientHistory { have: usize, need: usize },
    NoSignal,
    OrderFailed { reason: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPrice => write!(f, "no current price"),
            SkipReason::InsufficientCash { cash } => write!(f, "insufficient cash ({:.2})", cash),
            SkipReason::CooldownActive => write!(f, "cooldown active"),
            SkipReason::NotCorroborated => write!(f, "venue shows no balance"),
            SkipReason::NoHistory => write!(f, "history unavailable"),
            SkipReason::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({}/{})", have, need)
            }
            SkipReason::NoSignal => write!(f, "no rule fired"),
            SkipReason::OrderFailed { reason } => write!(f, "order failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub direction: RuleDirection,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub aborted: Option<String>,
    pub actions: Vec<ActionRecord>,
    pub skipped: Vec<SkippedTicker>,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            aborted: None,
            actions: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, ticker: &str, direction: RuleDirection, reason: SkipReason) {
        debug!(ticker, %direction, %reason, "ticker skipped");
        self.skipped.push(SkippedTicker {
            ticker: ticker.to_string(),
            direction,
            reason,
        });
    }

    pub fn skip_reason(&self, ticker: &str, direction: RuleDirection) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.ticker == ticker && s.direction == direction)
            .map(|s| &s.reason)
    }
}

pub struct Orchestrator<'a> {
    config: EngineConfig,
    market: &'a dyn MarketDataPort,
    venue: &'a dyn TradeVenue,
    event_log: &'a dyn EventLogPort,
    state: EngineState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: EngineConfig,
        market: &'a dyn MarketDataPort,
        venue: &'a dyn TradeVenue,
        event_log: &'a dyn EventLogPort,
    ) -> Self {
        let cooldown = CooldownState::new(config.cooldown, config.cooldown_scope);
        Self {
            config,
            market,
            venue,
            event_log,
            state: EngineState {
                holdings: HashMap::new(),
                balances: PortfolioBalances::default(),
                prices: MarketSnapshot::new(),
                cooldown,
            },
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Run one full cycle at `now`. Never fails: errors are logged and
    /// recorded in the report.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::new(now);
        info!(%now, tickers = self.config.watchlist.len(), "cycle started");

        if let Err(e) = self.refresh() {
            error!(error = %e, "refresh failed; skipping buy and sell passes");
            report.aborted = Some(e.to_string());
            return report;
        }

        self.buy_pass(now, &mut report);
        self.sell_pass(now, &mut report);

        info!(
            actions = report.actions.len(),
            skipped = report.skipped.len(),
            "cycle finished"
        );
        report
    }

    fn refresh(&mut self) -> Result<(), TraderError> {
        let balances = self.venue.get_portfolio(&self.config.portfolio_id)?;

        let mut holdings = HashMap::new();
        for ticker in &self.config.watchlist {
            let events = self.event_log.trade_events_for_ticker(ticker)?;
            if let Some(holding) = compute_holding(ticker, &events) {
                debug!(
                    ticker = %ticker,
                    quantity = holding.quantity,
                    average_cost = holding.average_cost,
                    "holding rebuilt"
                );
                holdings.insert(ticker.clone(), holding);
            }
        }

        let mut snapshot = MarketSnapshot::new();
        for ticker in &self.config.watchlist {
            match self.market.latest_price(ticker) {
                Ok(Some(price)) if price.is_finite() && price > 0.0 => {
                    snapshot.insert(ticker.clone(), price);
                }
                Ok(Some(price)) => {
                    warn!(ticker = %ticker, price, "ignoring non-positive latest price");
                }
                Ok(None) => debug!(ticker = %ticker, "no recent price"),
                Err(e) => warn!(ticker = %ticker, error = %e, "latest price unavailable"),
            }
        }

        self.state.balances = balances;
        self.state.holdings = holdings;
        self.state.prices = snapshot;
        Ok(())
    }

    fn buy_pass(&mut self, now: DateTime<Utc>, report: &mut CycleReport) {
        let allocation = self.config.allocation_usd;

        for ticker in self.config.watchlist.clone() {
            if self.state.balances.cash < allocation {
                let cash = self.state.balances.cash;
                report.skip(&ticker, RuleDirection::Buy, SkipReason::InsufficientCash { cash });
                continue;
            }
            let Some(price) = self.state.prices.get(&ticker).copied() else {
                report.skip(&ticker, RuleDirection::Buy, SkipReason::NoPrice);
                continue;
            };
            if self.state.cooldown.is_active(&ticker, now) {
                report.skip(&ticker, RuleDirection::Buy, SkipReason::CooldownActive);
                continue;
            }

            let Some(history) = self.history(&ticker, now) else {
                report.skip(&ticker, RuleDirection::Buy, SkipReason::NoHistory);
                continue;
            };
            // Buy rules ignore the position, as in the backtest.
            let rule = match evaluate_window(&self.config.buy_rules, price, &history, None) {
                WindowOutcome::Fired(rule) => rule.clone(),
                WindowOutcome::NoSignal => {
                    report.skip(&ticker, RuleDirection::Buy, SkipReason::NoSignal);
                    continue;
                }
                WindowOutcome::InsufficientHistory { have, need } => {
                    report.skip(
                        &ticker,
                        RuleDirection::Buy,
                        SkipReason::InsufficientHistory { have, need },
                    );
                    continue;
                }
            };

            let quantity = allocation / price;
            info!(ticker = %ticker, rule = %rule.id, price, quantity, "buy rule fired");
            match self.venue.submit_buy(&ticker, quantity, Some(price)) {
                Ok(ack) if ack.accepted => {
                    self.record_action(&ticker, TradeKind::Buy, &rule, price, quantity, now);
                    self.state.balances.cash -= allocation;
                    *self.state.balances.assets.entry(ticker.clone()).or_insert(0.0) += quantity;
                    report.actions.push(ActionRecord {
                        ticker: ticker.clone(),
                        kind: TradeKind::Buy,
                        rule_id: rule.id.clone(),
                        quantity,
                        price,
                        order_id: ack.order_id,
                    });
                }
                Ok(ack) => {
                    let err = rejection(&ticker, ack.message);
                    warn!(error = %err, "buy order rejected");
                    report.skip(
                        &ticker,
                        RuleDirection::Buy,
                        SkipReason::OrderFailed {
                            reason: err.to_string(),
                        },
                    );
                }
                Err(e) => {
                    error!(ticker = %ticker, error = %e, "buy order failed");
                    report.skip(
                        &ticker,
                        RuleDirection::Buy,
                        SkipReason::OrderFailed {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    fn sell_pass(&mut self, now: DateTime<Utc>, report: &mut CycleReport) {
        for ticker in self.config.watchlist.clone() {
            let Some(holding) = self.state.holdings.get(&ticker).cloned() else {
                continue;
            };
            let venue_quantity = self.state.balances.quantity(&ticker);
            if venue_quantity <= 0.0 {
                warn!(
                    ticker = %ticker,
                    ledger_quantity = holding.quantity,
                    "ledger holding not corroborated by venue balance"
                );
                report.skip(&ticker, RuleDirection::Sell, SkipReason::NotCorroborated);
                continue;
            }
            let Some(price) = self.state.prices.get(&ticker).copied() else {
                report.skip(&ticker, RuleDirection::Sell, SkipReason::NoPrice);
                continue;
            };
            if self.state.cooldown.is_active(&ticker, now) {
                report.skip(&ticker, RuleDirection::Sell, SkipReason::CooldownActive);
                continue;
            }

            let Some(history) = self.history(&ticker, now) else {
                report.skip(&ticker, RuleDirection::Sell, SkipReason::NoHistory);
                continue;
            };
            let rule = match evaluate_window(&self.config.sell_rules, price, &history, Some(&holding))
            {
                WindowOutcome::Fired(rule) => rule.clone(),
                WindowOutcome::NoSignal => {
                    report.skip(&ticker, RuleDirection::Sell, SkipReason::NoSignal);
                    continue;
                }
                WindowOutcome::InsufficientHistory { have, need } => {
                    report.skip(
                        &ticker,
                        RuleDirection::Sell,
                        SkipReason::InsufficientHistory { have, need },
                    );
                    continue;
                }
            };

            info!(
                ticker = %ticker,
                rule = %rule.id,
                price,
                quantity = venue_quantity,
                average_cost = holding.average_cost,
                "sell rule fired"
            );
            match self.venue.submit_sell(&ticker, venue_quantity, Some(price)) {
                Ok(ack) if ack.accepted => {
                    self.record_action(&ticker, TradeKind::Sell, &rule, price, venue_quantity, now);
                    self.state.balances.cash += venue_quantity * price;
                    self.state.balances.assets.insert(ticker.clone(), 0.0);
                    report.actions.push(ActionRecord {
                        ticker: ticker.clone(),
                        kind: TradeKind::Sell,
                        rule_id: rule.id.clone(),
                        quantity: venue_quantity,
                        price,
                        order_id: ack.order_id,
                    });
                }
                Ok(ack) => {
                    let err = rejection(&ticker, ack.message);
                    warn!(error = %err, "sell order rejected");
                    report.skip(
                        &ticker,
                        RuleDirection::Sell,
                        SkipReason::OrderFailed {
                            reason: err.to_string(),
                        },
                    );
                }
                Err(e) => {
                    error!(ticker = %ticker, error = %e, "sell order failed");
                    report.skip(
                        &ticker,
                        RuleDirection::Sell,
                        SkipReason::OrderFailed {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    /// Trailing price window ending at `now`, or `None` if the query failed.
    fn history(&self, ticker: &str, now: DateTime<Utc>) -> Option<Vec<f64>> {
        let range = PriceRange::trailing(now, self.config.history_lookback);
        match self.market.historical_prices(ticker, &range) {
            Ok(samples) => Some(prices(&samples)),
            Err(e) => {
                warn!(ticker, error = %e, "price history unavailable");
                None
            }
        }
    }

    /// Log the filled order and arm the cooldown. A log write failure does
    /// not undo the fill, so the cooldown is armed regardless.
    fn record_action(
        &mut self,
        ticker: &str,
        kind: TradeKind,
        rule: &RuleSpec,
        price: f64,
        quantity: f64,
        now: DateTime<Utc>,
    ) {
        let event = TradeEvent::automated(ticker, kind, price, quantity, now, &rule.id, rule.type_tag());
        if let Err(e) = self.event_log.append_trade_event(&event) {
            error!(ticker, %kind, error = %e, "failed to record trade event");
        }
        self.state.cooldown.arm(ticker, now);
        info!(
            ticker,
            %kind,
            cooldown_minutes = self.config.cooldown.num_minutes(),
            "action recorded; cooldown armed"
        );
    }
}

fn rejection(ticker: &str, message: Option<String>) -> TraderError {
    TraderError::OrderRejected {
        ticker: ticker.to_string(),
        reason: message.unwrap_or_else(|| "no reason given".to_string()),
    }
}
