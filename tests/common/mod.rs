#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeDelta};
use momotrader::domain::error::MomotraderError;
use momotrader::domain::ledger::TradeLedger;
pub use momotrader::domain::ohlcv::{Bar, Timeframe};
use momotrader::domain::params::ParameterSet;
use momotrader::domain::series::BarSeries;
use momotrader::ports::data_port::DataPort;
use momotrader::ports::ledger_port::{LedgerPort, ReportRow};
use std::cell::RefCell;
use std::collections::HashMap;

/// (open, high, low, close, volume)
pub type Row = (f64, f64, f64, f64, f64);

pub struct MockDataPort {
    pub data: HashMap<String, (Timeframe, Vec<Bar>)>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), (timeframe, bars));
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self, symbol: &str) -> Result<BarSeries, MomotraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(MomotraderError::integrity(symbol, reason.clone()));
        }
        match self.data.get(symbol) {
            Some((timeframe, bars)) => BarSeries::new(symbol, *timeframe, bars.clone()),
            None => Err(MomotraderError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, MomotraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// In-memory ledger store.
#[derive(Default)]
pub struct MemoryLedgerPort {
    pub ledgers: RefCell<Vec<(ParameterSet, TradeLedger)>>,
    pub reports: RefCell<Vec<(String, usize)>>,
}

impl LedgerPort for MemoryLedgerPort {
    fn write_ledger(
        &self,
        params: &ParameterSet,
        ledger: &TradeLedger,
    ) -> Result<(), MomotraderError> {
        let mut ledgers = self.ledgers.borrow_mut();
        ledgers.retain(|(p, _)| p != params);
        ledgers.push((params.clone(), ledger.clone()));
        Ok(())
    }

    fn read_ledger(&self, params: &ParameterSet) -> Result<TradeLedger, MomotraderError> {
        self.ledgers
            .borrow()
            .iter()
            .find(|(p, _)| p == params)
            .map(|(_, l)| l.clone())
            .ok_or_else(|| MomotraderError::NoData {
                symbol: params.to_string(),
            })
    }

    fn list_ledgers(&self) -> Result<Vec<ParameterSet>, MomotraderError> {
        Ok(self.ledgers.borrow().iter().map(|(p, _)| p.clone()).collect())
    }

    fn write_report(&self, rows: &[ReportRow], output_path: &str) -> Result<(), MomotraderError> {
        self.reports
            .borrow_mut()
            .push((output_path.to_string(), rows.len()));
        Ok(())
    }
}

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// Consecutive bars `step` apart starting at `start`.
pub fn make_bars(symbol: &str, start: &str, step: TimeDelta, rows: &[Row]) -> Vec<Bar> {
    let t0 = ts(start);
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Bar {
            symbol: symbol.to_string(),
            timestamp: t0 + step * i as i32,
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

pub fn daily_bars(symbol: &str, rows: &[Row]) -> Vec<Bar> {
    make_bars(symbol, "2024-03-01T16:00:00-05:00", TimeDelta::days(1), rows)
}

/// Flat bars, a pump bar at index 3, then a follow-through bar.
pub fn pump_rows() -> Vec<Row> {
    vec![
        (10.0, 10.0, 10.0, 10.0, 100.0),
        (10.0, 10.0, 10.0, 10.0, 100.0),
        (10.0, 10.0, 10.0, 10.0, 100.0),
        (10.0, 14.0, 10.0, 13.0, 1000.0),
        (13.0, 13.5, 12.5, 13.2, 100.0),
        (13.2, 13.2, 13.2, 13.2, 100.0),
    ]
}

/// A daily INI for the `cc` variant with short windows.
pub fn daily_ini(bars_dir: &str, ledger_dir: &str, report: &str) -> String {
    format!(
        r#"
[data]
bars_dir = {bars_dir}
timeframe = daily

[run]
variant = cc
volume_window = 3

[params]
rvol = 2

[grid]
day_net_change = 0.3,0.35

[filter]
rvol = >=2,>=3

[output]
ledger_dir = {ledger_dir}
report = {report}
"#
    )
}
