//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod cooldown;
pub mod engine_config;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod orchestrator;
pub mod price;
pub mod rule;
pub mod rule_eval;
pub mod scheduler;
pub mod trade_event;
pub mod watchlist;
