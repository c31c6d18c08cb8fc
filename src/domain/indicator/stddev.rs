//! Standard Deviation indicator.
//!
//! Population standard deviation over the trailing n prices.
//! STDDEV(n) = sqrt(sum((P[last-j] - SMA(n))^2 for j in 0..n) / n)

use super::{sma, trailing};

pub fn stddev(series: &[f64], period: usize) -> Option<f64> {
    let window = trailing(series, period)?;
    let mean = sma(series, period)?;

    let variance: f64 = window
        .iter()
        .map(|p| {
            let diff = p - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}
