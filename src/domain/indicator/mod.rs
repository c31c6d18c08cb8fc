//! Technical indicators over an ordered price sequence.
//!
//! Every function takes prices oldest first and looks at the trailing window
//! ending at the newest element. Insufficient data yields `None`, never a
//! panic.
//!
//! - [`sma::sma`]: simple moving average
//! - [`stddev::stddev`]: population standard deviation
//! - [`bollinger::bollinger_bands`]: SMA with ±k·σ bands
//! - [`roc::roc`]: percentage rate of change

pub mod bollinger;
pub mod roc;
pub mod sma;
pub mod stddev;

pub use bollinger::{BollingerBands, bollinger_bands};
pub use roc::roc;
pub use sma::sma;
pub use stddev::stddev;

use std::fmt;

/// Indicator identity plus parameters, used when describing rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Roc(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    /// Number of trailing samples the indicator needs.
    pub fn window(&self) -> usize {
        match self {
            IndicatorType::Sma(period) | IndicatorType::Bollinger { period, .. } => *period,
            IndicatorType::Roc(lookback) => lookback + 1,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// The last `period` elements, or `None` if there are fewer.
pub(crate) fn trailing(series: &[f64], period: usize) -> Option<&[f64]> {
    if period == 0 || series.len() < period {
        return None;
    }
    Some(&series[series.len() - period..])
}
