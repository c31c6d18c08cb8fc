//! Deterministic in-memory paper trading venue.
//!
//! Orders fill immediately and in full at the submitted price. Order ids are
//! sequential (`paper-1`, `paper-2`, ...). Fills are stamped from the venue's
//! [`Clock`], so a venue sharing the scheduler's clock records cycle time.

use crate::domain::error::TraderError;
use crate::domain::scheduler::{Clock, SystemClock};
use crate::domain::trade_event::TradeKind;
use crate::ports::venue_port::{
    OrderAck, OrderRecord, PortfolioBalances, PortfolioSummary, TradeVenue,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

#[derive(Debug, Default)]
struct Book {
    balances: PortfolioBalances,
    orders: Vec<OrderRecord>,
    next_id: u64,
}

#[derive(Debug)]
pub struct PaperVenue {
    portfolio_id: String,
    reject_all: bool,
    clock: Rc<dyn Clock>,
    book: RefCell<Book>,
}

impl PaperVenue {
    pub fn new(portfolio_id: &str, starting_cash: f64) -> Self {
        Self {
            portfolio_id: portfolio_id.to_string(),
            reject_all: false,
            clock: Rc::new(SystemClock),
            book: RefCell::new(Book {
                balances: PortfolioBalances {
                    cash: starting_cash,
                    ..PortfolioBalances::default()
                },
                ..Book::default()
            }),
        }
    }

    pub fn with_asset(self, ticker: &str, quantity: f64) -> Self {
        self.book
            .borrow_mut()
            .balances
            .assets
            .insert(ticker.to_string(), quantity);
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Refuse every order; used to exercise rejection handling.
    pub fn rejecting_orders(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub fn balances(&self) -> PortfolioBalances {
        self.book.borrow().balances.clone()
    }

    fn fill(
        &self,
        side: TradeKind,
        ticker: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, TraderError> {
        if self.reject_all {
            return Ok(OrderAck::rejected("venue is not accepting orders"));
        }
        let Some(price) = price.filter(|p| p.is_finite() && *p > 0.0) else {
            return Ok(OrderAck::rejected("paper venue requires a positive limit price"));
        };
        if !(quantity.is_finite() && quantity > 0.0) {
            return Ok(OrderAck::rejected(format!("invalid quantity {}", quantity)));
        }

        let mut book = self.book.borrow_mut();
        let notional = quantity * price;
        match side {
            TradeKind::Buy => {
                if notional > book.balances.cash + 1e-9 {
                    return Ok(OrderAck::rejected(format!(
                        "insufficient cash: need {:.2}, have {:.2}",
                        notional, book.balances.cash
                    )));
                }
                book.balances.cash = (book.balances.cash - notional).max(0.0);
                *book.balances.assets.entry(ticker.to_string()).or_insert(0.0) += quantity;
            }
            TradeKind::Sell => {
                let held = book.balances.quantity(ticker);
                if quantity > held + 1e-12 {
                    return Ok(OrderAck::rejected(format!(
                        "insufficient {}: need {}, have {}",
                        ticker, quantity, held
                    )));
                }
                book.balances.cash += notional;
                book.balances
                    .assets
                    .insert(ticker.to_string(), (held - quantity).max(0.0));
            }
        }

        book.next_id += 1;
        let order_id = format!("paper-{}", book.next_id);
        book.orders.push(OrderRecord {
            order_id: order_id.clone(),
            ticker: ticker.to_string(),
            side,
            quantity,
            price: Some(price),
            submitted_at: self.clock.now(),
        });
        info!(%order_id, ticker, %side, quantity, price, "paper order filled");
        Ok(OrderAck::accepted(order_id))
    }
}

impl TradeVenue for PaperVenue {
    fn list_portfolios(&self) -> Result<Vec<PortfolioSummary>, TraderError> {
        Ok(vec![PortfolioSummary {
            id: self.portfolio_id.clone(),
            name: "Paper".to_string(),
        }])
    }

    fn get_portfolio(&self, portfolio_id: &str) -> Result<PortfolioBalances, TraderError> {
        if portfolio_id != self.portfolio_id {
            return Err(TraderError::Venue {
                reason: format!("unknown portfolio '{}'", portfolio_id),
            });
        }
        Ok(self.book.borrow().balances.clone())
    }

    fn submit_buy(
        &self,
        ticker: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, TraderError> {
        self.fill(TradeKind::Buy, ticker, quantity, price)
    }

    fn submit_sell(
        &self,
        ticker: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, TraderError> {
        self.fill(TradeKind::Sell, ticker, quantity, price)
    }

    fn historical_orders(&self, ticker: Option<&str>) -> Result<Vec<OrderRecord>, TraderError> {
        Ok(self
            .book
            .borrow()
            .orders
            .iter()
            .filter(|o| ticker.is_none_or(|t| o.ticker == t))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }

        fn sleep(&self, _duration: std::time::Duration) {}
    }

    #[test]
    fn orders_are_stamped_from_the_clock() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let venue = PaperVenue::new("default", 100.0).with_clock(Rc::new(FixedClock(t)));
        venue.submit_buy("BTC-USD", 1.0, Some(50.0)).unwrap();
        venue.submit_sell("BTC-USD", 1.0, Some(55.0)).unwrap();

        let orders = venue.historical_orders(None).unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.submitted_at == t));
    }

    #[test]
    fn buy_debits_cash_and_credits_asset() {
        let venue = PaperVenue::new("default", 100.0);
        let ack = venue.submit_buy("BTC-USD", 0.5, Some(50.0)).unwrap();
        assert!(ack.accepted);
        assert_eq!(ack.order_id.as_deref(), Some("paper-1"));

        let balances = venue.get_portfolio("default").unwrap();
        assert!((balances.cash - 75.0).abs() < 1e-9);
        assert!((balances.quantity("BTC-USD") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn allocation_equal_to_cash_is_accepted() {
        let venue = PaperVenue::new("default", 10.0);
        let ack = venue.submit_buy("BTC-USD", 10.0 / 90.0, Some(90.0)).unwrap();
        assert!(ack.accepted);
    }

    #[test]
    fn buy_beyond_cash_is_rejected() {
        let venue = PaperVenue::new("default", 10.0);
        let ack = venue.submit_buy("BTC-USD", 1.0, Some(50.0)).unwrap();
        assert!(!ack.accepted);
        assert!(ack.message.unwrap().contains("insufficient cash"));
        assert!((venue.balances().cash - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_requires_balance() {
        let venue = PaperVenue::new("default", 0.0).with_asset("ETH-USD", 2.0);
        assert!(!venue.submit_sell("ETH-USD", 3.0, Some(10.0)).unwrap().accepted);
        assert!(venue.submit_sell("ETH-USD", 2.0, Some(10.0)).unwrap().accepted);
        let balances = venue.balances();
        assert!((balances.cash - 20.0).abs() < 1e-9);
        assert_eq!(balances.quantity("ETH-USD"), 0.0);
    }

    #[test]
    fn market_orders_are_rejected() {
        let venue = PaperVenue::new("default", 100.0);
        assert!(!venue.submit_buy("BTC-USD", 1.0, None).unwrap().accepted);
    }

    #[test]
    fn unknown_portfolio_is_an_error() {
        let venue = PaperVenue::new("default", 100.0);
        assert!(matches!(
            venue.get_portfolio("other"),
            Err(TraderError::Venue { .. })
        ));
    }

    #[test]
    fn order_history_filters_by_ticker() {
        let venue = PaperVenue::new("default", 1000.0);
        venue.submit_buy("BTC-USD", 1.0, Some(100.0)).unwrap();
        venue.submit_buy("ETH-USD", 1.0, Some(10.0)).unwrap();
        venue.submit_sell("BTC-USD", 1.0, Some(110.0)).unwrap();

        assert_eq!(venue.historical_orders(None).unwrap().len(), 3);
        let btc = venue.historical_orders(Some("BTC-USD")).unwrap();
        assert_eq!(btc.len(), 2);
        assert_eq!(btc[1].side, TradeKind::Sell);
        assert_eq!(btc[1].order_id, "paper-3");
    }
}
