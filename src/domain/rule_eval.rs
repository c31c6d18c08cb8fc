//! Rule evaluation engine.
//!
//! Evaluates a [`RuleSpec`] against the current price, the trailing price
//! history and the position (if any).
//!
//! # Evaluation Semantics
//!
//! - `history` is oldest first and ends at the current observation
//! - Indicator rules compute over `history`
//! - ROC rules take the `roc_period + 1` newest samples with the current
//!   price standing in for the newest one
//! - Holding rules compare against the holding's average cost
//! - Anything that cannot be evaluated (inert rule, missing holding, short
//!   history, undefined indicator) is `false`, never an error
//! - [`first_firing`] stops at the first rule that fires
//! - [`evaluate_window`] is the single entry point shared by the live loop
//!   and the backtest simulator

use tracing::{debug, warn};

use crate::domain::indicator::{bollinger_bands, roc, sma};
use crate::domain::ledger::Holding;
use crate::domain::rule::{RuleKind, RuleSpec, required_history};

/// Outcome of running one rule list over one price window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowOutcome<'a> {
    Fired(&'a RuleSpec),
    NoSignal,
    InsufficientHistory { have: usize, need: usize },
}

pub fn evaluate(
    rule: &RuleSpec,
    current_price: f64,
    history: &[f64],
    holding: Option<&Holding>,
) -> bool {
    if rule.kind.requires_holding() && holding.is_none() {
        warn!(rule = %rule.id, kind = rule.type_tag(), "rule needs a holding; not evaluated");
        return false;
    }

    let need = rule.kind.required_history();
    if history.len() < need {
        warn!(
            rule = %rule.id,
            have = history.len(),
            need,
            "history shorter than rule window; not evaluated"
        );
        return false;
    }

    let fired = match &rule.kind {
        RuleKind::SmaDipPercentage(p) => match sma(history, p.period) {
            Some(avg) => current_price <= avg * (1.0 - p.percent_below / 100.0),
            None => false,
        },
        RuleKind::BollingerLowerBandCross(p) => {
            let bands = bollinger_bands(history, p.period, p.std_dev_multiplier);
            bands.lower.is_some_and(|lower| current_price <= lower)
        }
        RuleKind::BollingerUpperBandCross(p) => {
            let bands = bollinger_bands(history, p.period, p.std_dev_multiplier);
            bands.upper.is_some_and(|upper| current_price >= upper)
        }
        RuleKind::BollingerMiddleBandCross(p) => {
            let bands = bollinger_bands(history, p.period, p.std_dev_multiplier);
            bands.middle.is_some_and(|middle| current_price >= middle)
        }
        RuleKind::RocDip(p) => match trailing_roc(history, current_price, p.roc_period) {
            Some(change) => change <= p.dip_trigger,
            None => false,
        },
        RuleKind::RocSpike(p) => {
            let Some(h) = holding else { return false };
            match trailing_roc(history, current_price, p.roc_period) {
                Some(change) => change >= p.spike_trigger && current_price > h.average_cost,
                None => false,
            }
        }
        RuleKind::ProfitPercentageTarget(p) => {
            let Some(h) = holding else { return false };
            current_price >= h.average_cost * (1.0 + p.percent_above / 100.0)
        }
        RuleKind::StopLossPercentage(p) => {
            let Some(h) = holding else { return false };
            current_price <= h.average_cost * (1.0 - p.percent_below / 100.0)
        }
        RuleKind::Inert { type_tag, reason } => {
            warn!(rule = %rule.id, kind = %type_tag, reason = %reason, "inert rule never fires");
            false
        }
    };

    debug!(rule = %rule.id, price = current_price, fired, "rule evaluated");
    fired
}

/// Evaluate `rules` in order and return the first that fires.
pub fn first_firing<'a>(
    rules: &'a [RuleSpec],
    current_price: f64,
    history: &[f64],
    holding: Option<&Holding>,
) -> Option<&'a RuleSpec> {
    rules
        .iter()
        .find(|rule| evaluate(rule, current_price, history, holding))
}

/// Check the window against the longest rule window, then evaluate `rules`
/// in order.
pub fn evaluate_window<'a>(
    rules: &'a [RuleSpec],
    current_price: f64,
    history: &[f64],
    holding: Option<&Holding>,
) -> WindowOutcome<'a> {
    let need = required_history(rules);
    if history.len() < need {
        return WindowOutcome::InsufficientHistory {
            have: history.len(),
            need,
        };
    }
    match first_firing(rules, current_price, history, holding) {
        Some(rule) => WindowOutcome::Fired(rule),
        None => WindowOutcome::NoSignal,
    }
}

/// ROC over the trailing `period + 1` samples, newest replaced by `current_price`.
fn trailing_roc(history: &[f64], current_price: f64, period: usize) -> Option<f64> {
    if history.len() < period + 1 {
        return None;
    }
    let end = history.len() - 1;
    let mut window: Vec<f64> = history[end - period..end].to_vec();
    window.push(current_price);
    roc(&window, period)
}
