//! Port traits the decision engine consumes.

pub mod config_port;
pub mod event_log_port;
pub mod market_data_port;
pub mod venue_port;
