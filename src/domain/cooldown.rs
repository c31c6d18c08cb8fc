//! Action cooldown.
//!
//! No new action may start while `now - last_action < duration`. With
//! [`CooldownScope::Global`] one action anywhere closes the gate for every
//! ticker; with [`CooldownScope::PerTicker`] each ticker has its own timer.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CooldownScope {
    #[default]
    Global,
    PerTicker,
}

impl FromStr for CooldownScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(CooldownScope::Global),
            "per_ticker" | "ticker" => Ok(CooldownScope::PerTicker),
            other => Err(format!("unknown cooldown scope '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CooldownState {
    pub duration: Duration,
    pub scope: CooldownScope,
    pub last_action: Option<DateTime<Utc>>,
    pub last_action_by_ticker: HashMap<String, DateTime<Utc>>,
}

impl CooldownState {
    pub fn new(duration: Duration, scope: CooldownScope) -> Self {
        Self {
            duration,
            scope,
            last_action: None,
            last_action_by_ticker: HashMap::new(),
        }
    }

    /// Whether an action on `ticker` is blocked at `now`.
    pub fn is_active(&self, ticker: &str, now: DateTime<Utc>) -> bool {
        let last = match self.scope {
            CooldownScope::Global => self.last_action,
            CooldownScope::PerTicker => self.last_action_by_ticker.get(ticker).copied(),
        };
        match last {
            Some(t) => now - t < self.duration,
            None => false,
        }
    }

    /// Time until the gate for `ticker` reopens, zero if already open.
    pub fn remaining(&self, ticker: &str, now: DateTime<Utc>) -> Duration {
        let last = match self.scope {
            CooldownScope::Global => self.last_action,
            CooldownScope::PerTicker => self.last_action_by_ticker.get(ticker).copied(),
        };
        match last {
            Some(t) => (t + self.duration - now).max(Duration::zero()),
            None => Duration::zero(),
        }
    }

    /// Start the cooldown after a confirmed action.
    pub fn arm(&mut self, ticker: &str, now: DateTime<Utc>) {
        self.last_action = Some(now);
        self.last_action_by_ticker.insert(ticker.to_string(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn fresh_state_is_open() {
        let c = CooldownState::new(Duration::minutes(30), CooldownScope::Global);
        assert!(!c.is_active("BTC-USD", at(0)));
        assert_eq!(c.remaining("BTC-USD", at(0)), Duration::zero());
    }

    #[test]
    fn global_cooldown_blocks_every_ticker() {
        let mut c = CooldownState::new(Duration::minutes(30), CooldownScope::Global);
        c.arm("BTC-USD", at(0));
        assert!(c.is_active("BTC-USD", at(10)));
        assert!(c.is_active("ETH-USD", at(10)));
        assert_eq!(c.remaining("ETH-USD", at(10)), Duration::minutes(20));
    }

    #[test]
    fn cooldown_expires_at_duration() {
        let mut c = CooldownState::new(Duration::minutes(30), CooldownScope::Global);
        c.arm("BTC-USD", at(0));
        assert!(c.is_active("BTC-USD", at(29)));
        assert!(!c.is_active("BTC-USD", at(30)));
    }

    #[test]
    fn per_ticker_cooldown_is_independent() {
        let mut c = CooldownState::new(Duration::minutes(30), CooldownScope::PerTicker);
        c.arm("BTC-USD", at(0));
        assert!(c.is_active("BTC-USD", at(10)));
        assert!(!c.is_active("ETH-USD", at(10)));
    }

    #[test]
    fn zero_duration_never_blocks() {
        let mut c = CooldownState::new(Duration::zero(), CooldownScope::Global);
        c.arm("BTC-USD", at(0));
        assert!(!c.is_active("BTC-USD", at(0)));
    }

    #[test]
    fn scope_from_str() {
        assert_eq!("global".parse::<CooldownScope>(), Ok(CooldownScope::Global));
        assert_eq!(
            "Per_Ticker".parse::<CooldownScope>(),
            Ok(CooldownScope::PerTicker)
        );
        assert!("sometimes".parse::<CooldownScope>().is_err());
    }
}
