//! Trade event log port trait.

use crate::domain::error::TraderError;
use crate::domain::trade_event::TradeEvent;

pub trait EventLogPort {
    fn append_trade_event(&self, event: &TradeEvent) -> Result<(), TraderError>;

    /// Every recorded event for `ticker`, in insertion order.
    fn trade_events_for_ticker(&self, ticker: &str) -> Result<Vec<TradeEvent>, TraderError>;
}
