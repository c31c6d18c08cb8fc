//! Backtest report writer: one CSV row per firing.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TraderError;
use std::io::Write;
use std::path::Path;

pub const HEADER: [&str; 5] = ["timestamp", "ticker", "price", "rule_id", "rule_type"];

pub fn write_firings<W: Write>(report: &BacktestReport, out: W) -> Result<(), TraderError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADER)?;
    for firing in &report.firings {
        wtr.write_record([
            firing.timestamp.to_rfc3339(),
            firing.ticker.clone(),
            firing.price.to_string(),
            firing.rule_id.clone(),
            firing.rule_type.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_firings_to_file(report: &BacktestReport, path: &Path) -> Result<(), TraderError> {
    let file = std::fs::File::create(path)?;
    write_firings(report, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::Firing;
    use chrono::{TimeZone, Utc};

    #[test]
    fn writes_header_and_rows() {
        let report = BacktestReport {
            firings: vec![Firing {
                ticker: "BTC-USD".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap(),
                price: 90.5,
                rule_id: "dip5".into(),
                rule_type: "sma_dip_percentage".into(),
            }],
            ..BacktestReport::default()
        };
        let mut buf = Vec::new();
        write_firings(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,ticker,price,rule_id,rule_type");
        assert_eq!(
            lines[1],
            "2024-01-02T03:04:00+00:00,BTC-USD,90.5,dip5,sma_dip_percentage"
        );
    }

    #[test]
    fn empty_report_is_header_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("firings.csv");
        write_firings_to_file(&BacktestReport::default(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
