//! In-memory event log. Contents are lost when the process exits.

use crate::domain::error::TraderError;
use crate::domain::trade_event::TradeEvent;
use crate::ports::event_log_port::EventLogPort;
use std::cell::RefCell;

#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RefCell<Vec<TradeEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<TradeEvent>) -> Self {
        Self {
            events: RefCell::new(events),
        }
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Every event across tickers, in insertion order.
    pub fn all_events(&self) -> Vec<TradeEvent> {
        self.events.borrow().clone()
    }
}

impl EventLogPort for MemoryEventLog {
    fn append_trade_event(&self, event: &TradeEvent) -> Result<(), TraderError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }

    fn trade_events_for_ticker(&self, ticker: &str) -> Result<Vec<TradeEvent>, TraderError> {
        Ok(self
            .events
            .borrow()
            .iter()
            .filter(|e| e.ticker == ticker)
            .cloned()
            .collect())
    }
}
