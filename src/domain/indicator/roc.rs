//! ROC (Rate of Change) indicator.
//!
//! ROC(n) = ((P[last] - P[last-n]) / P[last-n]) * 100
//! Undefined when fewer than n+1 prices exist or P[last-n] == 0.

pub fn roc(series: &[f64], lookback: usize) -> Option<f64> {
    if series.len() < lookback + 1 {
        return None;
    }
    let current = *series.last()?;
    let past = series[series.len() - 1 - lookback];

    if past == 0.0 {
        return None;
    }
    Some(((current - past) / past) * 100.0)
}
