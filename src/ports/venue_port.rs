//! Trade venue port trait.
//!
//! The engine only sees this capability interface. Which implementation sits
//! behind it (the in-memory paper venue, or a brokerage client) is chosen
//! once at startup from configuration.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::trade_event::TradeKind;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub id: String,
    pub name: String,
}

/// Cash and per-asset quantities held at the venue.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioBalances {
    pub cash: f64,
    pub assets: BTreeMap<String, f64>,
}

impl PortfolioBalances {
    pub fn quantity(&self, ticker: &str) -> f64 {
        self.assets.get(ticker).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub accepted: bool,
    pub order_id: Option<String>,
    pub message: Option<String>,
}

impl OrderAck {
    pub fn accepted(order_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            order_id: Some(order_id.into()),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            order_id: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub ticker: String,
    pub side: TradeKind,
    pub quantity: f64,
    pub price: Option<f64>,
    pub submitted_at: DateTime<Utc>,
}

pub trait TradeVenue {
    fn list_portfolios(&self) -> Result<Vec<PortfolioSummary>, TraderError>;

    fn get_portfolio(&self, portfolio_id: &str) -> Result<PortfolioBalances, TraderError>;

    fn submit_buy(
        &self,
        ticker: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, TraderError>;

    fn submit_sell(
        &self,
        ticker: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, TraderError>;

    /// Orders placed through this venue, optionally for one ticker only.
    fn historical_orders(&self, ticker: Option<&str>) -> Result<Vec<OrderRecord>, TraderError>;
}
