//! SQLite event log adapter.
//!
//! Trade events live in a single append-only table; the autoincrement id
//! preserves insertion order across restarts.

use crate::domain::error::TraderError;
use crate::domain::trade_event::TradeEvent;
use crate::ports::config_port::ConfigPort;
use crate::ports::event_log_port::EventLogPort;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

pub struct SqliteEventLog {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteEventLog {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| TraderError::config_missing("sqlite", "path"))?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::Database {
                reason: e.to_string(),
            })?;

        debug!(path = %db_path, pool_size, "sqlite event log opened");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(|e: r2d2::Error| TraderError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trade_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticker TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    price REAL NOT NULL,
                    quantity REAL NOT NULL,
                    usd_amount REAL NOT NULL,
                    timestamp TEXT NOT NULL,
                    rule_id TEXT,
                    rule_type TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_trade_events_ticker ON trade_events(ticker);",
            )
            .map_err(|e: rusqlite::Error| TraderError::DatabaseQuery {
                reason: e.to_string(),
            })
    }
}

impl EventLogPort for SqliteEventLog {
    fn append_trade_event(&self, event: &TradeEvent) -> Result<(), TraderError> {
        self.conn()?
            .execute(
                "INSERT INTO trade_events
                    (ticker, event_type, price, quantity, usd_amount, timestamp, rule_id, rule_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.ticker,
                    event.event_type,
                    event.price,
                    event.quantity,
                    event.usd_amount,
                    event.timestamp.to_rfc3339(),
                    event.rule_id,
                    event.rule_type
                ],
            )
            .map_err(|e: rusqlite::Error| TraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn trade_events_for_ticker(&self, ticker: &str) -> Result<Vec<TradeEvent>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ticker, event_type, price, quantity, usd_amount, timestamp, rule_id, rule_type
                 FROM trade_events
                 WHERE ticker = ?1
                 ORDER BY id ASC",
            )
            .map_err(|e: rusqlite::Error| TraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![ticker], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(|e: rusqlite::Error| TraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut events = Vec::new();
        for row in rows {
            let (ticker, event_type, price, quantity, usd_amount, ts, rule_id, rule_type) =
                row.map_err(|e: rusqlite::Error| TraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?;
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| TraderError::DatabaseQuery {
                    reason: format!("invalid timestamp '{}': {}", ts, e),
                })?
                .with_timezone(&Utc);
            events.push(TradeEvent {
                ticker,
                event_type,
                price,
                quantity,
                usd_amount,
                timestamp,
                rule_id,
                rule_type,
            });
        }
        Ok(events)
    }
}
