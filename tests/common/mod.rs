#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use watchtrader::domain::error::TraderError;
use watchtrader::domain::price::{PriceRange, PriceSample, window};
use watchtrader::domain::rule::{RawRule, RuleSpec};
use watchtrader::domain::scheduler::Clock;
use watchtrader::domain::trade_event::TradeEvent;
use watchtrader::ports::event_log_port::EventLogPort;
use watchtrader::ports::market_data_port::MarketDataPort;

pub struct MockMarketData {
    pub series: HashMap<String, Vec<PriceSample>>,
    pub latest: RefCell<HashMap<String, f64>>,
    pub errors: HashMap<String, String>,
    pub history_calls: Cell<usize>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            latest: RefCell::new(HashMap::new()),
            errors: HashMap::new(),
            history_calls: Cell::new(0),
        }
    }

    pub fn with_series(mut self, ticker: &str, samples: Vec<PriceSample>) -> Self {
        self.series.insert(ticker.to_string(), samples);
        self
    }

    pub fn with_latest(self, ticker: &str, price: f64) -> Self {
        self.set_latest(ticker, price);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn set_latest(&self, ticker: &str, price: f64) {
        self.latest.borrow_mut().insert(ticker.to_string(), price);
    }

    fn check(&self, ticker: &str) -> Result<(), TraderError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(TraderError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MarketDataPort for MockMarketData {
    fn latest_price(&self, ticker: &str) -> Result<Option<f64>, TraderError> {
        self.check(ticker)?;
        Ok(self.latest.borrow().get(ticker).copied())
    }

    fn historical_prices(
        &self,
        ticker: &str,
        range: &PriceRange,
    ) -> Result<Vec<PriceSample>, TraderError> {
        self.history_calls.set(self.history_calls.get() + 1);
        self.check(ticker)?;
        Ok(self
            .series
            .get(ticker)
            .map(|s| window(s, range).to_vec())
            .unwrap_or_default())
    }
}

/// Event log whose reads always fail.
pub struct UnreachableEventLog;

impl EventLogPort for UnreachableEventLog {
    fn append_trade_event(&self, _event: &TradeEvent) -> Result<(), TraderError> {
        Err(TraderError::Database {
            reason: "connection refused".into(),
        })
    }

    fn trade_events_for_ticker(&self, _ticker: &str) -> Result<Vec<TradeEvent>, TraderError> {
        Err(TraderError::Database {
            reason: "connection refused".into(),
        })
    }
}

/// Clock that advances only when slept on.
#[derive(Debug)]
pub struct StepClock {
    now: Cell<DateTime<Utc>>,
}

impl StepClock {
    pub fn starting_at(t: DateTime<Utc>) -> Self {
        Self { now: Cell::new(t) }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn sleep(&self, duration: std::time::Duration) {
        self.now.set(self.now.get() + Duration::from_std(duration).unwrap());
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub fn at(minute: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minute)
}

/// One sample per minute for minutes `from..to`, all at `price`.
pub fn flat_series(from: i64, to: i64, price: f64) -> Vec<PriceSample> {
    (from..to).map(|m| PriceSample::new(at(m), price)).collect()
}

pub fn rule(id: &str, type_tag: &str, params: &[(&str, f64)]) -> RuleSpec {
    RuleSpec::from_raw(&RawRule {
        id: id.to_string(),
        description: String::new(),
        type_tag: type_tag.to_string(),
        params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    })
    .unwrap()
}

pub fn sma_dip(id: &str, period: f64, percent_below: f64) -> RuleSpec {
    rule(
        id,
        "sma_dip_percentage",
        &[("period", period), ("percent_below", percent_below)],
    )
}

pub fn profit_target(id: &str, percent_above: f64) -> RuleSpec {
    rule(id, "profit_percentage_target", &[("percent_above", percent_above)])
}

pub fn roc_dip(id: &str, roc_period: f64, dip_trigger: f64) -> RuleSpec {
    rule(
        id,
        "roc_dip",
        &[("roc_period", roc_period), ("dip_trigger", dip_trigger)],
    )
}
