//! CLI definition and dispatch.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::csv_report_adapter::{write_firings, write_firings_to_file};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_event_log::MemoryEventLog;
use crate::adapters::paper_venue::PaperVenue;
use crate::domain::backtest::{BacktestConfig, BacktestReport, run_backtest};
use crate::domain::config_validation::{
    BACKEND_MEMORY, BACKEND_SQLITE, event_log_backend, parse_timestamp, validate_backtest_config,
    validate_engine_config,
};
use crate::domain::cooldown::CooldownScope;
use crate::domain::engine_config::{DEFAULT_PORTFOLIO, EngineConfig};
use crate::domain::error::TraderError;
use crate::domain::ledger::{compute_holding, net_spend};
use crate::domain::orchestrator::{CycleReport, Orchestrator};
use crate::domain::rule::{RawRule, RuleDirection, RuleKind, RuleSpec};
use crate::domain::scheduler::{Scheduler, SystemClock};
use crate::domain::watchlist::parse_tickers;
use crate::logging::{DEFAULT_LEVEL, init_tracing};
use crate::ports::config_port::ConfigPort;
use crate::ports::event_log_port::EventLogPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::venue_port::TradeVenue;

#[derive(Parser, Debug)]
#[command(name = "watchtrader", about = "Rule-driven watchlist trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the decision loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Run exactly one decision cycle and print the report
    Cycle {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay stored history through the buy rules
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration and list the loaded rules
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show holdings rebuilt from the event log
    Holdings {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run { config, cycles } => run_loop(&config, cycles),
        Command::Cycle { config } => run_loop(&config, Some(1)),
        Command::Backtest {
            config,
            start,
            end,
            output,
        } => run_backtest_command(&config, start.as_deref(), end.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Holdings { config } => run_holdings(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load the INI file and start logging at its configured level.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    let level = adapter
        .get_string("logging", "level")
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    init_tracing(&level);
    info!(path = %path.display(), "configuration loaded");
    Ok(adapter)
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, TraderError> {
    let watchlist_raw = config
        .get_string("engine", "watchlist")
        .ok_or_else(|| TraderError::config_missing("engine", "watchlist"))?;
    let watchlist = parse_tickers(&watchlist_raw)
        .map_err(|e| TraderError::config_invalid("engine", "watchlist", e.to_string()))?;

    let cooldown_scope = match config.get_string("engine", "cooldown_scope") {
        Some(s) => s
            .parse::<CooldownScope>()
            .map_err(|reason| TraderError::config_invalid("engine", "cooldown_scope", reason))?,
        None => CooldownScope::default(),
    };

    let poll_seconds = config.get_int("engine", "poll_interval_seconds", 60);
    let poll_seconds = u64::try_from(poll_seconds).map_err(|_| {
        TraderError::config_invalid("engine", "poll_interval_seconds", "must be positive")
    })?;

    let buy_rules = build_rules(config, RuleDirection::Buy)?;
    let sell_rules = build_rules(config, RuleDirection::Sell)?;
    if buy_rules.is_empty() {
        warn!("no buy rules configured; engine will never buy");
    }

    Ok(EngineConfig {
        watchlist,
        allocation_usd: config.get_double("engine", "allocation_usd", 10.0),
        buy_rules,
        sell_rules,
        cooldown: Duration::minutes(config.get_int("engine", "cooldown_minutes", 60)),
        cooldown_scope,
        poll_interval: std::time::Duration::from_secs(poll_seconds),
        history_lookback: Duration::minutes(
            config.get_int("engine", "history_lookback_minutes", 1500),
        ),
        portfolio_id: config
            .get_string("engine", "portfolio")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PORTFOLIO.to_string()),
    })
}

/// Rules listed under `[rules] buy` or `[rules] sell`, each defined in its
/// own `[rule.<id>]` section. With `[rules] strict = false` a bad rule is
/// loaded inert instead of failing the load.
pub fn build_rules(
    config: &dyn ConfigPort,
    direction: RuleDirection,
) -> Result<Vec<RuleSpec>, TraderError> {
    let strict = config.get_bool("rules", "strict", true);
    let ids = config.get_list("rules", &direction.to_string());

    let mut rules = Vec::with_capacity(ids.len());
    for id in ids {
        let rule = match read_raw_rule(config, &id) {
            Ok(raw) if strict => RuleSpec::for_direction(&raw, direction)?,
            Ok(raw) => RuleSpec::from_raw_lenient(&raw, direction),
            Err(e) if strict => return Err(e),
            Err(e) => {
                warn!(rule = %id, error = %e, "rule loaded as inert");
                RuleSpec {
                    id: id.clone(),
                    description: String::new(),
                    kind: RuleKind::Inert {
                        type_tag: config
                            .get_string(&rule_section(&id), "type")
                            .unwrap_or_default(),
                        reason: e.to_string(),
                    },
                }
            }
        };
        info!(%direction, rule = %rule, "rule loaded");
        rules.push(rule);
    }
    Ok(rules)
}

fn rule_section(id: &str) -> String {
    format!("rule.{}", id)
}

/// Read `[rule.<id>]`: `type`, optional `description`, every other key a
/// numeric parameter.
pub fn read_raw_rule(config: &dyn ConfigPort, id: &str) -> Result<RawRule, TraderError> {
    let section = rule_section(id);
    let keys = config.section_keys(&section);
    if keys.is_empty() {
        return Err(TraderError::RuleInvalid {
            rule_id: id.to_string(),
            reason: format!("no [{}] section", section),
        });
    }

    let mut raw = RawRule {
        id: id.to_string(),
        ..RawRule::default()
    };
    for key in keys {
        let value = config.get_string(&section, &key).unwrap_or_default();
        match key.as_str() {
            "type" => raw.type_tag = value.trim().to_string(),
            "description" => raw.description = value.trim().to_string(),
            _ => {
                let number = value.trim().parse::<f64>().map_err(|_| TraderError::RuleInvalid {
                    rule_id: id.to_string(),
                    reason: format!("parameter '{}' is not a number: '{}'", key, value),
                })?;
                raw.params.insert(key, number);
            }
        }
    }

    if raw.type_tag.is_empty() {
        return Err(TraderError::RuleInvalid {
            rule_id: id.to_string(),
            reason: "missing rule type".to_string(),
        });
    }
    Ok(raw)
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    start_override: Option<&str>,
    end_override: Option<&str>,
) -> Result<BacktestConfig, TraderError> {
    let start = timestamp_setting(config, "start", start_override)?;
    let end = timestamp_setting(config, "end", end_override)?;
    let bt = BacktestConfig {
        start,
        end,
        step: Duration::minutes(config.get_int("backtest", "step_minutes", 5)),
        history_lookback: Duration::minutes(
            config.get_int("engine", "history_lookback_minutes", 1500),
        ),
    };
    bt.validate()?;
    Ok(bt)
}

fn timestamp_setting(
    config: &dyn ConfigPort,
    key: &str,
    cli_value: Option<&str>,
) -> Result<DateTime<Utc>, TraderError> {
    let value = cli_value
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", key))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TraderError::config_missing("backtest", key))?;
    parse_timestamp(&value, "backtest", key)
}

pub fn build_market_data(config: &dyn ConfigPort) -> Result<CsvMarketData, TraderError> {
    let path = config
        .get_string("market_data", "path")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TraderError::config_missing("market_data", "path"))?;
    Ok(CsvMarketData::new(PathBuf::from(path)))
}

pub fn build_event_log(config: &dyn ConfigPort) -> Result<Box<dyn EventLogPort>, TraderError> {
    match event_log_backend(config).as_str() {
        BACKEND_MEMORY => {
            warn!("using in-memory event log; trade history will not survive a restart");
            Ok(Box::new(MemoryEventLog::new()))
        }
        #[cfg(feature = "sqlite")]
        BACKEND_SQLITE => {
            let log = crate::adapters::sqlite_adapter::SqliteEventLog::from_config(config)?;
            log.initialize_schema()?;
            Ok(Box::new(log))
        }
        other => Err(TraderError::config_invalid(
            "event_log",
            "backend",
            format!("unsupported backend '{}'", other),
        )),
    }
}

/// The paper venue starts from configured cash less the net spend recorded
/// in the event log, holding whatever the log says is held, so restarts keep
/// ledger and venue in agreement.
pub fn build_venue(
    config: &dyn ConfigPort,
    event_log: &dyn EventLogPort,
    engine: &EngineConfig,
) -> Result<Box<dyn TradeVenue>, TraderError> {
    let kind = config
        .get_string("venue", "kind")
        .unwrap_or_else(|| "paper".to_string());
    if !kind.trim().eq_ignore_ascii_case("paper") {
        return Err(TraderError::config_invalid(
            "venue",
            "kind",
            format!("unsupported venue kind '{}'", kind.trim()),
        ));
    }

    let starting_cash = config.get_double("venue", "starting_cash", 0.0);
    let mut spent = 0.0;
    let mut assets = Vec::new();
    for ticker in &engine.watchlist {
        let events = event_log.trade_events_for_ticker(ticker)?;
        spent += net_spend(&events);
        if let Some(holding) = compute_holding(ticker, &events) {
            assets.push((ticker, holding.quantity));
        }
    }

    let cash = starting_cash - spent;
    if cash < 0.0 {
        warn!(
            starting_cash,
            spent,
            "event log spends more than starting cash; venue starts empty"
        );
    }
    info!(cash = cash.max(0.0), holdings = assets.len(), "paper venue seeded from event log");

    let mut venue = PaperVenue::new(&engine.portfolio_id, cash.max(0.0));
    for (ticker, quantity) in assets {
        venue = venue.with_asset(ticker, quantity);
    }
    Ok(Box::new(venue))
}

fn run_loop(config_path: &Path, cycles: Option<u64>) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    validate_engine_config(&adapter)?;
    let engine = build_engine_config(&adapter)?;

    let market = build_market_data(&adapter)?;
    let event_log = build_event_log(&adapter)?;
    let venue = build_venue(&adapter, event_log.as_ref(), &engine)?;

    let mut scheduler = Scheduler::new(engine.poll_interval);
    if let Some(n) = cycles {
        scheduler = scheduler.with_max_cycles(n);
    }
    let mut orchestrator = Orchestrator::new(engine, &market, venue.as_ref(), event_log.as_ref());
    scheduler.run(&mut orchestrator, &SystemClock, |report| {
        println!("{}", describe_cycle(report));
    });
    Ok(())
}

fn run_backtest_command(
    config_path: &Path,
    start: Option<&str>,
    end: Option<&str>,
    output: Option<&Path>,
) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let bt = build_backtest_config(&adapter, start, end)?;
    let engine = build_engine_config(&adapter)?;
    let market = build_market_data(&adapter)?;

    let report = run_backtest(&market, &engine.watchlist, &engine.buy_rules, &bt)?;
    print!("{}", describe_backtest(&report));

    match output {
        Some(path) => {
            write_firings_to_file(&report, path)?;
            info!(path = %path.display(), firings = report.firings.len(), "firings written");
        }
        None => write_firings(&report, std::io::stdout().lock())?,
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    validate_engine_config(&adapter)?;
    let engine = build_engine_config(&adapter)?;
    if !adapter.section_keys("backtest").is_empty() {
        validate_backtest_config(&adapter)?;
    }

    println!("Configuration OK");
    println!("  Watchlist:  {}", engine.watchlist.join(", "));
    println!("  Allocation: ${:.2}", engine.allocation_usd);
    println!(
        "  Cooldown:   {} min ({:?})",
        engine.cooldown.num_minutes(),
        engine.cooldown_scope
    );
    for (label, rules, window) in [
        ("Buy rules", &engine.buy_rules, engine.buy_window()),
        ("Sell rules", &engine.sell_rules, engine.sell_window()),
    ] {
        println!("  {} (window {}):", label, window);
        for rule in rules {
            let marker = if rule.is_inert() { " (inert)" } else { "" };
            println!("    {}{}", rule, marker);
        }
    }
    Ok(())
}

fn run_holdings(config_path: &Path) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let engine = build_engine_config(&adapter)?;
    let event_log = build_event_log(&adapter)?;
    let market = build_market_data(&adapter).ok();

    println!(
        "{:<12} {:>16} {:>14} {:>14}",
        "TICKER", "QUANTITY", "AVG COST", "UNREALIZED"
    );
    for ticker in &engine.watchlist {
        let events = event_log.trade_events_for_ticker(ticker)?;
        let Some(holding) = compute_holding(ticker, &events) else {
            continue;
        };
        let pnl = market
            .as_ref()
            .and_then(|m| m.latest_price(ticker).ok().flatten())
            .map(|price| format!("{:.2}", holding.unrealized_pnl(price)))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>16.8} {:>14.4} {:>14}",
            ticker, holding.quantity, holding.average_cost, pnl
        );
    }
    Ok(())
}

pub fn describe_cycle(report: &CycleReport) -> String {
    let mut out = format!("cycle at {}", report.started_at.to_rfc3339());
    if let Some(reason) = &report.aborted {
        out.push_str(&format!(": aborted ({})", reason));
        return out;
    }
    out.push_str(&format!(
        ": {} action(s), {} skip(s)",
        report.actions.len(),
        report.skipped.len()
    ));
    for action in &report.actions {
        out.push_str(&format!(
            "\n  {} {} {:.8} @ {:.4} via {}",
            action.kind, action.ticker, action.quantity, action.price, action.rule_id
        ));
    }
    for skip in &report.skipped {
        out.push_str(&format!(
            "\n  skip {} {}: {}",
            skip.direction, skip.ticker, skip.reason
        ));
    }
    out
}

pub fn describe_backtest(report: &BacktestReport) -> String {
    let mut out = String::new();
    for (ticker, evaluated) in &report.steps_evaluated {
        let skipped = report.steps_skipped.get(ticker).copied().unwrap_or(0);
        let fired = report.firings_for(ticker).count();
        out.push_str(&format!(
            "{}: {} firing(s) over {} evaluated step(s), {} skipped\n",
            ticker, fired, evaluated, skipped
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BASE: &str = r#"
[engine]
watchlist = btc-usd, eth-usd
allocation_usd = 25
cooldown_minutes = 15
cooldown_scope = per_ticker
poll_interval_seconds = 30

[rules]
buy = dip5, band
sell = target

[rule.dip5]
type = sma_dip_percentage
description = Five percent under the daily mean
period = 1440
percentBelow = 5

[rule.band]
type = bollinger_lower_band_cross
period = 20
std_dev_multiplier = 2.5

[rule.target]
type = profit_percentage_target
percent_above = 8
"#;

    #[test]
    fn builds_engine_config() {
        let engine = build_engine_config(&config(BASE)).unwrap();
        assert_eq!(engine.watchlist, vec!["BTC-USD", "ETH-USD"]);
        assert_eq!(engine.allocation_usd, 25.0);
        assert_eq!(engine.cooldown, Duration::minutes(15));
        assert_eq!(engine.cooldown_scope, CooldownScope::PerTicker);
        assert_eq!(engine.poll_interval, std::time::Duration::from_secs(30));
        assert_eq!(engine.history_lookback, Duration::minutes(1500));
        assert_eq!(engine.portfolio_id, DEFAULT_PORTFOLIO);
        assert_eq!(engine.buy_rules.len(), 2);
        assert_eq!(engine.buy_rules[0].id, "dip5");
        assert_eq!(engine.buy_rules[0].description, "Five percent under the daily mean");
        assert_eq!(engine.buy_window(), 1440);
        assert_eq!(engine.sell_rules[0].type_tag(), "profit_percentage_target");
    }

    #[test]
    fn unknown_rule_type_fails_when_strict() {
        let content = BASE.replace("type = profit_percentage_target", "type = moon_shot");
        let err = build_engine_config(&config(&content)).unwrap_err();
        assert!(matches!(err, TraderError::RuleInvalid { rule_id, .. } if rule_id == "target"));
    }

    #[test]
    fn unknown_rule_type_is_inert_when_lenient() {
        let content = BASE
            .replace("type = profit_percentage_target", "type = moon_shot")
            .replace("sell = target", "sell = target\nstrict = false");
        let engine = build_engine_config(&config(&content)).unwrap();
        assert!(engine.sell_rules[0].is_inert());
        assert!(!engine.buy_rules[0].is_inert());
    }

    #[test]
    fn missing_rule_section_is_inert_when_lenient() {
        let content = BASE.replace("sell = target", "sell = target, ghost\nstrict = false");
        let engine = build_engine_config(&config(&content)).unwrap();
        assert_eq!(engine.sell_rules.len(), 2);
        assert_eq!(engine.sell_rules[1].id, "ghost");
        assert!(engine.sell_rules[1].is_inert());
    }

    #[test]
    fn non_numeric_parameter_is_rejected() {
        let content = BASE.replace("period = 20", "period = twenty");
        let err = build_engine_config(&config(&content)).unwrap_err();
        assert!(matches!(err, TraderError::RuleInvalid { rule_id, .. } if rule_id == "band"));
    }

    #[test]
    fn backtest_overrides_take_precedence() {
        let content = format!(
            "{}\n[backtest]\nstart = 2024-01-01\nend = 2024-01-08\nstep_minutes = 10\n",
            BASE
        );
        let bt = build_backtest_config(&config(&content), Some("2024-01-03"), None).unwrap();
        assert_eq!(bt.start, parse_timestamp("2024-01-03", "backtest", "start").unwrap());
        assert_eq!(bt.end, parse_timestamp("2024-01-08", "backtest", "end").unwrap());
        assert_eq!(bt.step, Duration::minutes(10));
    }

    #[test]
    fn backtest_without_dates_fails() {
        let err = build_backtest_config(&config(BASE), None, None).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { key, .. } if key == "start"));
    }

    #[test]
    fn memory_event_log_is_selectable() {
        let content = format!("{}\n[event_log]\nbackend = memory\n", BASE);
        assert!(build_event_log(&config(&content)).is_ok());
    }

    #[test]
    fn only_paper_venue_is_supported() {
        let content = format!("{}\n[venue]\nkind = brokerage\n", BASE);
        let adapter = config(&content);
        let engine = build_engine_config(&adapter).unwrap();
        let log = MemoryEventLog::new();
        let err = build_venue(&adapter, &log, &engine).err().unwrap();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "kind"));
    }

    #[test]
    fn paper_venue_is_seeded_from_ledger() {
        use crate::domain::trade_event::{TradeEvent, TradeKind};

        let content = format!("{}\n[venue]\nkind = paper\nstarting_cash = 50\n", BASE);
        let adapter = config(&content);
        let engine = build_engine_config(&adapter).unwrap();
        let log = MemoryEventLog::new();
        log.append_trade_event(&TradeEvent::automated(
            "BTC-USD",
            TradeKind::Buy,
            100.0,
            0.25,
            Utc::now(),
            "dip5",
            "sma_dip_percentage",
        ))
        .unwrap();

        let venue = build_venue(&adapter, &log, &engine).unwrap();
        let balances = venue.get_portfolio(DEFAULT_PORTFOLIO).unwrap();
        assert_eq!(balances.cash, 25.0);
        assert_eq!(balances.quantity("BTC-USD"), 0.25);
    }

    #[test]
    fn paper_venue_cash_credits_sell_proceeds() {
        use crate::domain::trade_event::{TradeEvent, TradeKind};

        let content = format!("{}\n[venue]\nkind = paper\nstarting_cash = 50\n", BASE);
        let adapter = config(&content);
        let engine = build_engine_config(&adapter).unwrap();
        let log = MemoryEventLog::new();
        let t = Utc::now();
        for (kind, price) in [(TradeKind::Buy, 100.0), (TradeKind::Sell, 120.0)] {
            log.append_trade_event(&TradeEvent::automated(
                "ETH-USD", kind, price, 0.25, t, "dip5", "sma_dip_percentage",
            ))
            .unwrap();
        }

        let venue = build_venue(&adapter, &log, &engine).unwrap();
        let balances = venue.get_portfolio(DEFAULT_PORTFOLIO).unwrap();
        assert_eq!(balances.cash, 55.0);
        assert_eq!(balances.quantity("ETH-USD"), 0.0);
    }

    #[test]
    fn buy_list_rejects_holding_rules() {
        let content = BASE.replace("buy = dip5, band", "buy = dip5, target");
        let err = build_engine_config(&config(&content)).unwrap_err();
        assert!(matches!(err, TraderError::RuleInvalid { rule_id, .. } if rule_id == "target"));
    }
}
