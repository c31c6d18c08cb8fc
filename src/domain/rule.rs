//! Rule specifications.
//!
//! A rule is loaded once from configuration as a [`RawRule`] (an id, a type
//! tag and a map of named numeric parameters) and converted into a
//! [`RuleSpec`] whose [`RuleKind`] carries strongly typed parameters. All
//! parameter validation happens here, at load time; evaluation never has to
//! re-check them.

use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorType;

pub const SMA_DIP_PERCENTAGE: &str = "sma_dip_percentage";
pub const BOLLINGER_LOWER_BAND_CROSS: &str = "bollinger_lower_band_cross";
pub const BOLLINGER_UPPER_BAND_CROSS: &str = "bollinger_upper_band_cross";
pub const BOLLINGER_MIDDLE_BAND_CROSS: &str = "bollinger_middle_band_cross";
pub const ROC_DIP: &str = "roc_dip";
pub const ROC_SPIKE: &str = "roc_spike";
pub const PROFIT_PERCENTAGE_TARGET: &str = "profit_percentage_target";
pub const STOP_LOSS_PERCENTAGE: &str = "stop_loss_percentage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleDirection {
    Buy,
    Sell,
}

impl fmt::Display for RuleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDirection::Buy => write!(f, "buy"),
            RuleDirection::Sell => write!(f, "sell"),
        }
    }
}

/// Untyped rule descriptor as read from configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRule {
    pub id: String,
    pub description: String,
    pub type_tag: String,
    pub params: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmaDipParams {
    pub period: usize,
    pub percent_below: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerParams {
    pub period: usize,
    pub std_dev_multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocDipParams {
    pub roc_period: usize,
    pub dip_trigger: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocSpikeParams {
    pub roc_period: usize,
    pub spike_trigger: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitTargetParams {
    pub percent_above: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLossParams {
    pub percent_below: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    SmaDipPercentage(SmaDipParams),
    BollingerLowerBandCross(BollingerParams),
    BollingerUpperBandCross(BollingerParams),
    BollingerMiddleBandCross(BollingerParams),
    RocDip(RocDipParams),
    RocSpike(RocSpikeParams),
    ProfitPercentageTarget(ProfitTargetParams),
    StopLossPercentage(StopLossParams),
    /// A rule that could not be loaded. Never fires.
    Inert { type_tag: String, reason: String },
}

impl RuleKind {
    pub fn type_tag(&self) -> &str {
        match self {
            RuleKind::SmaDipPercentage(_) => SMA_DIP_PERCENTAGE,
            RuleKind::BollingerLowerBandCross(_) => BOLLINGER_LOWER_BAND_CROSS,
            RuleKind::BollingerUpperBandCross(_) => BOLLINGER_UPPER_BAND_CROSS,
            RuleKind::BollingerMiddleBandCross(_) => BOLLINGER_MIDDLE_BAND_CROSS,
            RuleKind::RocDip(_) => ROC_DIP,
            RuleKind::RocSpike(_) => ROC_SPIKE,
            RuleKind::ProfitPercentageTarget(_) => PROFIT_PERCENTAGE_TARGET,
            RuleKind::StopLossPercentage(_) => STOP_LOSS_PERCENTAGE,
            RuleKind::Inert { type_tag, .. } => type_tag,
        }
    }

    /// The indicator this rule reads, if any.
    pub fn indicator(&self) -> Option<IndicatorType> {
        match self {
            RuleKind::SmaDipPercentage(p) => Some(IndicatorType::Sma(p.period)),
            RuleKind::BollingerLowerBandCross(p)
            | RuleKind::BollingerUpperBandCross(p)
            | RuleKind::BollingerMiddleBandCross(p) => Some(IndicatorType::Bollinger {
                period: p.period,
                stddev_mult_x100: (p.std_dev_multiplier * 100.0).round() as u32,
            }),
            RuleKind::RocDip(p) => Some(IndicatorType::Roc(p.roc_period)),
            RuleKind::RocSpike(p) => Some(IndicatorType::Roc(p.roc_period)),
            RuleKind::ProfitPercentageTarget(_)
            | RuleKind::StopLossPercentage(_)
            | RuleKind::Inert { .. } => None,
        }
    }

    /// Rules that compare against the position's average cost.
    pub fn requires_holding(&self) -> bool {
        matches!(
            self,
            RuleKind::RocSpike(_)
                | RuleKind::ProfitPercentageTarget(_)
                | RuleKind::StopLossPercentage(_)
        )
    }

    /// History samples needed before the rule can be evaluated.
    ///
    /// History ends at the current observation, so ROC rules need
    /// `roc_period + 1` samples.
    pub fn required_history(&self) -> usize {
        self.indicator().map_or(0, |indicator| indicator.window())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub id: String,
    pub description: String,
    pub kind: RuleKind,
}

impl RuleSpec {
    /// Validate a raw descriptor into a typed rule.
    pub fn from_raw(raw: &RawRule) -> Result<RuleSpec, TraderError> {
        let params = Params {
            rule_id: &raw.id,
            values: &raw.params,
        };
        let kind = match raw.type_tag.trim().to_ascii_lowercase().as_str() {
            SMA_DIP_PERCENTAGE => RuleKind::SmaDipPercentage(SmaDipParams {
                period: params.period("period")?,
                percent_below: params.percentage("percent_below")?,
            }),
            BOLLINGER_LOWER_BAND_CROSS => {
                RuleKind::BollingerLowerBandCross(params.bollinger()?)
            }
            BOLLINGER_UPPER_BAND_CROSS => {
                RuleKind::BollingerUpperBandCross(params.bollinger()?)
            }
            BOLLINGER_MIDDLE_BAND_CROSS => {
                RuleKind::BollingerMiddleBandCross(params.bollinger()?)
            }
            ROC_DIP => RuleKind::RocDip(RocDipParams {
                roc_period: params.period("roc_period")?,
                dip_trigger: params.finite("dip_trigger")?,
            }),
            ROC_SPIKE => RuleKind::RocSpike(RocSpikeParams {
                roc_period: params.period("roc_period")?,
                spike_trigger: params.finite("spike_trigger")?,
            }),
            PROFIT_PERCENTAGE_TARGET => RuleKind::ProfitPercentageTarget(ProfitTargetParams {
                percent_above: params.percentage("percent_above")?,
            }),
            STOP_LOSS_PERCENTAGE => RuleKind::StopLossPercentage(StopLossParams {
                percent_below: params.percentage("percent_below")?,
            }),
            other => {
                return Err(TraderError::RuleInvalid {
                    rule_id: raw.id.clone(),
                    reason: format!("unknown rule type '{}'", other),
                });
            }
        };

        Ok(RuleSpec {
            id: raw.id.clone(),
            description: raw.description.clone(),
            kind,
        })
    }

    /// [`RuleSpec::from_raw`] for a rule list of the given direction. Buy
    /// rules are replayed by the backtest, which has no position, so rules
    /// that need a holding are sell-only.
    pub fn for_direction(
        raw: &RawRule,
        direction: RuleDirection,
    ) -> Result<RuleSpec, TraderError> {
        let spec = RuleSpec::from_raw(raw)?;
        if direction == RuleDirection::Buy && spec.kind.requires_holding() {
            return Err(TraderError::RuleInvalid {
                rule_id: raw.id.clone(),
                reason: format!("'{}' needs a holding and is sell-only", spec.type_tag()),
            });
        }
        Ok(spec)
    }

    /// Like [`RuleSpec::for_direction`], but a bad descriptor becomes an
    /// inert rule instead of an error.
    pub fn from_raw_lenient(raw: &RawRule, direction: RuleDirection) -> RuleSpec {
        match RuleSpec::for_direction(raw, direction) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(rule = %raw.id, error = %e, "rule loaded as inert");
                RuleSpec {
                    id: raw.id.clone(),
                    description: raw.description.clone(),
                    kind: RuleKind::Inert {
                        type_tag: raw.type_tag.clone(),
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    pub fn type_tag(&self) -> &str {
        self.kind.type_tag()
    }

    pub fn is_inert(&self) -> bool {
        matches!(self.kind, RuleKind::Inert { .. })
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.type_tag())?;
        if let Some(ind) = self.kind.indicator() {
            write!(f, " {}", ind)?;
        }
        if !self.description.is_empty() {
            write!(f, " - {}", self.description)?;
        }
        Ok(())
    }
}

/// Longest history window any of `rules` needs.
pub fn required_history(rules: &[RuleSpec]) -> usize {
    rules
        .iter()
        .map(|r| r.kind.required_history())
        .max()
        .unwrap_or(0)
}

/// Typed accessors over a raw parameter map. Keys match case-insensitively
/// and ignore underscores, so `percentBelow` and `percent_below` are the same.
struct Params<'a> {
    rule_id: &'a str,
    values: &'a BTreeMap<String, f64>,
}

impl Params<'_> {
    fn invalid(&self, reason: String) -> TraderError {
        TraderError::RuleInvalid {
            rule_id: self.rule_id.to_string(),
            reason,
        }
    }

    fn get(&self, name: &str) -> Result<f64, TraderError> {
        let wanted = normalize_key(name);
        self.values
            .iter()
            .find(|(k, _)| normalize_key(k) == wanted)
            .map(|(_, v)| *v)
            .ok_or_else(|| self.invalid(format!("missing parameter '{}'", name)))
    }

    fn finite(&self, name: &str) -> Result<f64, TraderError> {
        let v = self.get(name)?;
        if !v.is_finite() {
            return Err(self.invalid(format!("parameter '{}' must be finite", name)));
        }
        Ok(v)
    }

    fn percentage(&self, name: &str) -> Result<f64, TraderError> {
        let v = self.finite(name)?;
        if v < 0.0 {
            return Err(self.invalid(format!("parameter '{}' must be non-negative", name)));
        }
        Ok(v)
    }

    fn period(&self, name: &str) -> Result<usize, TraderError> {
        let v = self.finite(name)?;
        if v < 1.0 || v.fract() != 0.0 {
            return Err(self.invalid(format!(
                "parameter '{}' must be a positive whole number",
                name
            )));
        }
        Ok(v as usize)
    }

    fn bollinger(&self) -> Result<BollingerParams, TraderError> {
        let period = self.period("period")?;
        let std_dev_multiplier = self.finite("std_dev_multiplier")?;
        if std_dev_multiplier <= 0.0 {
            return Err(self.invalid("parameter 'std_dev_multiplier' must be positive".into()));
        }
        Ok(BollingerParams {
            period,
            std_dev_multiplier,
        })
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
