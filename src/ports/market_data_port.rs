//! Market data access port trait.

use crate::domain::error::TraderError;
use crate::domain::price::{PriceRange, PriceSample};

pub trait MarketDataPort {
    /// Most recent price, or `None` when there is no recent data.
    fn latest_price(&self, ticker: &str) -> Result<Option<f64>, TraderError>;

    /// Samples inside `range`, ascending by time.
    fn historical_prices(
        &self,
        ticker: &str,
        range: &PriceRange,
    ) -> Result<Vec<PriceSample>, TraderError>;
}
