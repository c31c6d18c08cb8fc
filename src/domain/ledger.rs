//! Position ledger: cost basis and quantity rebuilt from the event log.
//!
//! Uses moving-average costing. A sell removes quantity at the position's
//! current average unit cost, so partial sells leave the unit cost unchanged.
//! The result is a pure function of the event sequence; recomputing from the
//! same history always gives the same holding.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use super::trade_event::{TradeEvent, TradeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub as_of: DateTime<Utc>,
}

impl Holding {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_cost
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.average_cost)
    }
}

/// Rebuild the holding for `ticker` from its trade history.
///
/// Events are stably sorted by timestamp, so same-instant events keep their
/// log order. Events for other tickers are ignored. Returns `None` when the
/// replay ends flat.
pub fn compute_holding(ticker: &str, events: &[TradeEvent]) -> Option<Holding> {
    let mut ordered: Vec<&TradeEvent> = events.iter().filter(|e| e.ticker == ticker).collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut quantity = 0.0_f64;
    let mut cost = 0.0_f64;
    let mut last_timestamp = None;

    for event in ordered {
        match event.kind() {
            Some(TradeKind::Buy) => {
                quantity += event.quantity;
                cost += event.usd_amount;
                last_timestamp = Some(event.timestamp);
            }
            Some(TradeKind::Sell) if quantity > 0.0 => {
                let avg_cost = cost / quantity;
                quantity -= event.quantity;
                cost -= event.quantity * avg_cost;
                if quantity < 0.0 {
                    quantity = 0.0;
                }
                if cost < 0.0 {
                    cost = 0.0;
                }
                last_timestamp = Some(event.timestamp);
            }
            Some(TradeKind::Sell) => last_timestamp = Some(event.timestamp),
            None => {
                debug!(ticker, event_type = %event.event_type, "ignoring event without trade kind");
            }
        }
    }

    match last_timestamp {
        Some(as_of) if quantity > 0.0 => Some(Holding {
            ticker: ticker.to_string(),
            quantity,
            average_cost: cost / quantity,
            as_of,
        }),
        _ => None,
    }
}

/// Cash that left the account: buy amounts less sell proceeds. Negative
/// once sells have returned more than buys spent.
pub fn net_spend(events: &[TradeEvent]) -> f64 {
    events
        .iter()
        .map(|e| match e.kind() {
            Some(TradeKind::Buy) => e.usd_amount,
            Some(TradeKind::Sell) => -e.usd_amount,
            None => 0.0,
        })
        .sum()
}

/// Holdings for every ticker in a mixed history that is still long.
pub fn compute_holdings(events: &[TradeEvent]) -> BTreeMap<String, Holding> {
    let mut tickers: Vec<&str> = events.iter().map(|e| e.ticker.as_str()).collect();
    tickers.sort_unstable();
    tickers.dedup();

    tickers
        .into_iter()
        .filter_map(|t| compute_holding(t, events).map(|h| (t.to_string(), h)))
        .collect()
}
