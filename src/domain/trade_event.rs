//! Recorded trade events.
//!
//! Events are immutable once appended to the log. Holdings are derived from
//! them, never stored alongside.

use chrono::{DateTime, Utc};
use std::fmt;

pub const AUTOMATED_BUY: &str = "AUTOMATED_BUY";
pub const AUTOMATED_SELL: &str = "AUTOMATED_SELL";
pub const MANUAL_BUY: &str = "MANUAL_BUY";
pub const MANUAL_SELL: &str = "MANUAL_SELL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeKind {
    Buy,
    Sell,
}

impl TradeKind {
    /// Classify an event-type tag. Any tag mentioning BUY is a buy; any
    /// mentioning SELL is a sell.
    pub fn from_tag(tag: &str) -> Option<TradeKind> {
        let upper = tag.to_ascii_uppercase();
        if upper.contains("BUY") {
            Some(TradeKind::Buy)
        } else if upper.contains("SELL") {
            Some(TradeKind::Sell)
        } else {
            None
        }
    }
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "BUY"),
            TradeKind::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub ticker: String,
    pub event_type: String,
    pub price: f64,
    pub quantity: f64,
    pub usd_amount: f64,
    pub timestamp: DateTime<Utc>,
    pub rule_id: Option<String>,
    pub rule_type: Option<String>,
}

impl TradeEvent {
    pub fn kind(&self) -> Option<TradeKind> {
        TradeKind::from_tag(&self.event_type)
    }

    /// An event produced by a rule firing, valued at `price`.
    pub fn automated(
        ticker: &str,
        kind: TradeKind,
        price: f64,
        quantity: f64,
        timestamp: DateTime<Utc>,
        rule_id: &str,
        rule_type: &str,
    ) -> Self {
        let event_type = match kind {
            TradeKind::Buy => AUTOMATED_BUY,
            TradeKind::Sell => AUTOMATED_SELL,
        };
        TradeEvent {
            ticker: ticker.to_string(),
            event_type: event_type.to_string(),
            price,
            quantity,
            usd_amount: price * quantity,
            timestamp,
            rule_id: Some(rule_id.to_string()),
            rule_type: Some(rule_type.to_string()),
        }
    }
}
