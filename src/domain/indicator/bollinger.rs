//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).

use super::{sma, stddev};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BollingerBands {
    pub upper: Option<f64>,
    pub middle: Option<f64>,
    pub lower: Option<f64>,
}

pub fn bollinger_bands(series: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let Some(middle) = sma(series, period) else {
        return BollingerBands::default();
    };

    match stddev(series, period) {
        Some(sd) => BollingerBands {
            upper: Some(middle + multiplier * sd),
            middle: Some(middle),
            lower: Some(middle - multiplier * sd),
        },
        None => BollingerBands {
            middle: Some(middle),
            ..BollingerBands::default()
        },
    }
}
