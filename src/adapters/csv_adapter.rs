//! CSV file market data adapter.
//!
//! One file per ticker, `<base_path>/<TICKER>.csv`, with a `timestamp,price`
//! header. Timestamps are RFC 3339 or `YYYY-MM-DD HH:MM:SS` in UTC.

use crate::domain::error::TraderError;
use crate::domain::price::{PriceRange, PriceSample, window};
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    /// Every sample in the ticker's file, ascending by time.
    fn load(&self, ticker: &str) -> Result<Vec<PriceSample>, TraderError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| TraderError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut samples = Vec::new();

        for result in rdr.records() {
            let record = result?;
            let ts_str = record.get(0).ok_or_else(|| invalid(ticker, "missing timestamp column"))?;
            let timestamp = parse_timestamp(ts_str)
                .ok_or_else(|| invalid(ticker, &format!("invalid timestamp '{}'", ts_str)))?;
            let price: f64 = record
                .get(1)
                .ok_or_else(|| invalid(ticker, "missing price column"))?
                .parse()
                .map_err(|e| invalid(ticker, &format!("invalid price value: {}", e)))?;
            if !(price.is_finite() && price > 0.0) {
                return Err(invalid(ticker, &format!("non-positive price at {}", ts_str)));
            }
            samples.push(PriceSample::new(timestamp, price));
        }

        samples.sort_by_key(|s| s.timestamp);
        debug!(ticker, rows = samples.len(), path = %path.display(), "price file loaded");
        Ok(samples)
    }
}

fn invalid(ticker: &str, reason: &str) -> TraderError {
    TraderError::DataUnavailable {
        ticker: ticker.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

impl MarketDataPort for CsvMarketData {
    fn latest_price(&self, ticker: &str) -> Result<Option<f64>, TraderError> {
        Ok(self.load(ticker)?.last().map(|s| s.price))
    }

    fn historical_prices(
        &self,
        ticker: &str,
        range: &PriceRange,
    ) -> Result<Vec<PriceSample>, TraderError> {
        let samples = self.load(ticker)?;
        Ok(window(&samples, range).to_vec())
    }
}
