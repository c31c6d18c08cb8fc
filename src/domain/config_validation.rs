//! Configuration validation.
//!
//! Runs before the engine starts; every failure here is fatal.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::cooldown::CooldownScope;
use crate::domain::error::TraderError;
use crate::domain::watchlist::parse_tickers;
use crate::ports::config_port::ConfigPort;

pub const BACKEND_SQLITE: &str = "sqlite";
pub const BACKEND_MEMORY: &str = "memory";
pub const VENUE_PAPER: &str = "paper";

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_market_data(config)?;
    validate_event_log(config)?;
    validate_watchlist(config)?;
    validate_allocation(config)?;
    validate_timing(config)?;
    validate_venue(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_market_data(config)?;
    validate_watchlist(config)?;
    let start = required_timestamp(config, "backtest", "start")?;
    let end = required_timestamp(config, "backtest", "end")?;
    if start >= end {
        return Err(TraderError::config_invalid(
            "backtest",
            "start",
            "start must be before end",
        ));
    }
    if config.get_int("backtest", "step_minutes", 5) < 1 {
        return Err(TraderError::config_invalid(
            "backtest",
            "step_minutes",
            "step_minutes must be at least 1",
        ));
    }
    Ok(())
}

/// Event log backend name, defaulting to sqlite when that feature is built.
pub fn event_log_backend(config: &dyn ConfigPort) -> String {
    let default = if cfg!(feature = "sqlite") {
        BACKEND_SQLITE
    } else {
        BACKEND_MEMORY
    };
    config
        .get_string("event_log", "backend")
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str, section: &str, key: &str) -> Result<DateTime<Utc>, TraderError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            TraderError::config_invalid(
                section,
                key,
                format!("invalid {} '{}', expected RFC 3339 or YYYY-MM-DD", key, value),
            )
        })
}

fn required_timestamp(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<DateTime<Utc>, TraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => parse_timestamp(&s, section, key),
        _ => Err(TraderError::config_missing(section, key)),
    }
}

fn validate_market_data(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("market_data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TraderError::config_missing("market_data", "path")),
    }
}

fn validate_event_log(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match event_log_backend(config).as_str() {
        BACKEND_SQLITE => {
            if !cfg!(feature = "sqlite") {
                return Err(TraderError::config_invalid(
                    "event_log",
                    "backend",
                    "sqlite support not compiled in",
                ));
            }
            match config.get_string("sqlite", "path") {
                Some(s) if !s.trim().is_empty() => Ok(()),
                _ => Err(TraderError::config_missing("sqlite", "path")),
            }
        }
        BACKEND_MEMORY => Ok(()),
        other => Err(TraderError::config_invalid(
            "event_log",
            "backend",
            format!("unknown backend '{}'", other),
        )),
    }
}

fn validate_watchlist(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let raw = config
        .get_string("engine", "watchlist")
        .ok_or_else(|| TraderError::config_missing("engine", "watchlist"))?;
    parse_tickers(&raw)
        .map(|_| ())
        .map_err(|e| TraderError::config_invalid("engine", "watchlist", e.to_string()))
}

fn validate_allocation(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("engine", "allocation_usd", 10.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(TraderError::config_invalid(
            "engine",
            "allocation_usd",
            "allocation_usd must be positive",
        ));
    }
    Ok(())
}

fn validate_timing(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_int("engine", "cooldown_minutes", 60) < 0 {
        return Err(TraderError::config_invalid(
            "engine",
            "cooldown_minutes",
            "cooldown_minutes must be non-negative",
        ));
    }
    if config.get_int("engine", "poll_interval_seconds", 60) < 1 {
        return Err(TraderError::config_invalid(
            "engine",
            "poll_interval_seconds",
            "poll_interval_seconds must be at least 1",
        ));
    }
    if config.get_int("engine", "history_lookback_minutes", 1500) < 1 {
        return Err(TraderError::config_invalid(
            "engine",
            "history_lookback_minutes",
            "history_lookback_minutes must be at least 1",
        ));
    }
    if let Some(scope) = config.get_string("engine", "cooldown_scope") {
        scope
            .parse::<CooldownScope>()
            .map_err(|reason| TraderError::config_invalid("engine", "cooldown_scope", reason))?;
    }
    Ok(())
}

fn validate_venue(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let kind = config
        .get_string("venue", "kind")
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_else(|| VENUE_PAPER.to_string());
    if kind != VENUE_PAPER {
        return Err(TraderError::config_invalid(
            "venue",
            "kind",
            format!("unsupported venue kind '{}'", kind),
        ));
    }
    if config.get_double("venue", "starting_cash", 0.0) < 0.0 {
        return Err(TraderError::config_invalid(
            "venue",
            "starting_cash",
            "starting_cash must be non-negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use chrono::TimeZone;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = r#"
[engine]
watchlist = BTC-USD, ETH-USD
allocation_usd = 10
cooldown_minutes = 60
poll_interval_seconds = 60

[market_data]
path = /tmp/prices

[event_log]
backend = memory

[venue]
kind = paper
starting_cash = 100
"#;

    #[test]
    fn valid_engine_config_passes() {
        assert!(validate_engine_config(&make_config(VALID)).is_ok());
    }

    #[test]
    fn missing_market_data_path_fails() {
        let config = make_config(&VALID.replace("path = /tmp/prices", ""));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { section, .. } if section == "market_data"));
    }

    #[test]
    fn empty_watchlist_fails() {
        let config = make_config(&VALID.replace("BTC-USD, ETH-USD", ""));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(err.is_fatal_config());
    }

    #[test]
    fn duplicate_ticker_fails() {
        let config = make_config(&VALID.replace("BTC-USD, ETH-USD", "BTC-USD, btc-usd"));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "watchlist"));
    }

    #[test]
    fn zero_allocation_fails() {
        let config = make_config(&VALID.replace("allocation_usd = 10", "allocation_usd = 0"));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "allocation_usd"));
    }

    #[test]
    fn negative_cooldown_fails() {
        let config = make_config(&VALID.replace("cooldown_minutes = 60", "cooldown_minutes = -1"));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "cooldown_minutes"));
    }

    #[test]
    fn zero_poll_interval_fails() {
        let config = make_config(&VALID.replace(
            "poll_interval_seconds = 60",
            "poll_interval_seconds = 0",
        ));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(
            matches!(err, TraderError::ConfigInvalid { key, .. } if key == "poll_interval_seconds")
        );
    }

    #[test]
    fn unknown_venue_kind_fails() {
        let config = make_config(&VALID.replace("kind = paper", "kind = brokerage"));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { section, .. } if section == "venue"));
    }

    #[test]
    fn unknown_backend_fails() {
        let config = make_config(&VALID.replace("backend = memory", "backend = redis"));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_backend_requires_path() {
        let config = make_config(&VALID.replace("backend = memory", "backend = sqlite"));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { section, .. } if section == "sqlite"));
    }

    #[test]
    fn bad_cooldown_scope_fails() {
        let config = make_config(&VALID.replace(
            "cooldown_minutes = 60",
            "cooldown_minutes = 60\ncooldown_scope = sometimes",
        ));
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "cooldown_scope"));
    }

    #[test]
    fn backtest_dates_must_be_ordered() {
        let content = format!(
            "{}\n[backtest]\nstart = 2024-02-01\nend = 2024-01-01\n",
            VALID
        );
        let err = validate_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "start"));
    }

    #[test]
    fn backtest_requires_start() {
        let content = format!("{}\n[backtest]\nend = 2024-01-01\n", VALID);
        let err = validate_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { key, .. } if key == "start"));
    }

    #[test]
    fn valid_backtest_config_passes() {
        let content = format!(
            "{}\n[backtest]\nstart = 2024-01-01T00:00:00Z\nend = 2024-01-08\nstep_minutes = 15\n",
            VALID
        );
        assert!(validate_backtest_config(&make_config(&content)).is_ok());
    }

    #[test]
    fn parse_timestamp_accepts_both_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02", "backtest", "start").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-01-02T00:00:00Z", "backtest", "start").unwrap(),
            expected
        );
        assert!(parse_timestamp("02/01/2024", "backtest", "start").is_err());
    }
}
