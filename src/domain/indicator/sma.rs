//! Simple Moving Average.
//!
//! SMA(n) = sum(P[last-j] for j in 0..n) / n

use super::trailing;

pub fn sma(series: &[f64], period: usize) -> Option<f64> {
    let window = trailing(series, period)?;
    Some(window.iter().sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_of_last_period_elements() {
        let s = [10.0, 20.0, 30.0, 40.0, 50.0];
        let v = sma(&s, 3).unwrap();
        assert!((v - 40.0).abs() < 1e-10);
    }

    #[test]
    fn sma_full_window() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert!((sma(&s, 4).unwrap() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn sma_insufficient_data() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[], 1), None);
    }

    #[test]
    fn sma_zero_period() {
        assert_eq!(sma(&[1.0, 2.0], 0), None);
    }
}
