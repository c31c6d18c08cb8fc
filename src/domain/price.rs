//! Price samples and time ranges.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Inclusive time range for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PriceRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window of length `lookback` ending at `end`.
    pub fn trailing(end: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: end - lookback,
            end,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Latest known price per ticker. A missing entry means no recent data.
pub type MarketSnapshot = HashMap<String, f64>;

/// Extract the price column, oldest first.
pub fn prices(samples: &[PriceSample]) -> Vec<f64> {
    samples.iter().map(|s| s.price).collect()
}

/// Slice of an ascending series that falls inside `range`.
pub fn window<'a>(samples: &'a [PriceSample], range: &PriceRange) -> &'a [PriceSample] {
    let lo = samples.partition_point(|s| s.timestamp < range.start);
    let hi = samples.partition_point(|s| s.timestamp <= range.end);
    if lo >= hi { &[] } else { &samples[lo..hi] }
}
