//! CSV persistence for trade ledgers and the summary report.
//!
//! Each ledger lives in `trades-<parameter set>.csv` under the ledger
//! directory; the tag is embedded as a JSON object column.

use crate::domain::error::MomotraderError;
use crate::domain::ledger::TradeLedger;
use crate::domain::metrics::STAT_COLUMNS;
use crate::domain::params::ParameterSet;
use crate::domain::position::{Tag, Trade};
use crate::ports::ledger_port::{LedgerPort, ReportRow};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LEDGER_PREFIX: &str = "trades";

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    symbol: String,
    size: i64,
    entry_bar: usize,
    exit_bar: usize,
    entry_price: f64,
    exit_price: f64,
    stop: Option<f64>,
    target: Option<f64>,
    pnl: f64,
    entry_time: DateTime<FixedOffset>,
    exit_time: DateTime<FixedOffset>,
    /// Seconds.
    duration: i64,
    tag: String,
}

impl LedgerRecord {
    fn from_trade(trade: &Trade) -> Result<Self, MomotraderError> {
        let tag = serde_json::to_string(&trade.tag).map_err(|e| MomotraderError::Csv {
            reason: format!("cannot encode tag of {} trade: {e}", trade.symbol),
        })?;
        Ok(LedgerRecord {
            symbol: trade.symbol.clone(),
            size: trade.size,
            entry_bar: trade.entry_bar,
            exit_bar: trade.exit_bar,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            stop: trade.stop_loss,
            target: trade.take_profit,
            pnl: trade.pnl,
            entry_time: trade.entry_time,
            exit_time: trade.exit_time,
            duration: trade.duration().num_seconds(),
            tag,
        })
    }

    fn into_trade(self) -> Result<Trade, MomotraderError> {
        let tag: Tag = if self.tag.trim().is_empty() {
            Tag::new()
        } else {
            serde_json::from_str(&self.tag).map_err(|e| MomotraderError::Csv {
                reason: format!("invalid tag for {} trade: {e}", self.symbol),
            })?
        };
        Ok(Trade {
            symbol: self.symbol,
            size: self.size,
            entry_bar: self.entry_bar,
            exit_bar: self.exit_bar,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            stop_loss: self.stop,
            take_profit: self.target,
            pnl: self.pnl,
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            tag,
        })
    }
}

pub struct CsvLedgerAdapter {
    ledger_dir: PathBuf,
}

impl CsvLedgerAdapter {
    pub fn new(ledger_dir: PathBuf) -> Self {
        Self { ledger_dir }
    }

    pub fn ledger_path(&self, params: &ParameterSet) -> PathBuf {
        self.ledger_dir
            .join(format!("{}.csv", params.file_stem(LEDGER_PREFIX)))
    }

    /// Read a ledger file by path, whatever its name.
    pub fn read_path(path: &Path) -> Result<TradeLedger, MomotraderError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let trades = rdr
            .deserialize::<LedgerRecord>()
            .map(|record| record?.into_trade())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TradeLedger::new(trades))
    }
}

impl LedgerPort for CsvLedgerAdapter {
    fn write_ledger(
        &self,
        params: &ParameterSet,
        ledger: &TradeLedger,
    ) -> Result<(), MomotraderError> {
        fs::create_dir_all(&self.ledger_dir)?;
        let path = self.ledger_path(params);
        let mut wtr = csv::Writer::from_path(&path)?;
        for trade in ledger {
            wtr.serialize(LedgerRecord::from_trade(trade)?)?;
        }
        if ledger.is_empty() {
            wtr.write_record([
                "symbol",
                "size",
                "entry_bar",
                "exit_bar",
                "entry_price",
                "exit_price",
                "stop",
                "target",
                "pnl",
                "entry_time",
                "exit_time",
                "duration",
                "tag",
            ])?;
        }
        wtr.flush()?;
        debug!(path = %path.display(), trades = ledger.len(), "wrote ledger");
        Ok(())
    }

    fn read_ledger(&self, params: &ParameterSet) -> Result<TradeLedger, MomotraderError> {
        let path = self.ledger_path(params);
        if !path.exists() {
            return Err(MomotraderError::NoData {
                symbol: params.file_stem(LEDGER_PREFIX),
            });
        }
        Self::read_path(&path)
    }

    fn list_ledgers(&self) -> Result<Vec<ParameterSet>, MomotraderError> {
        let mut sets = Vec::new();
        for entry in fs::read_dir(&self.ledger_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == LEDGER_PREFIX || stem.starts_with("trades-") {
                sets.push(ParameterSet::from_file_stem(stem, LEDGER_PREFIX)?);
            }
        }
        sets.sort_by_key(|s| s.to_string());
        Ok(sets)
    }

    /// Parameter columns in first-seen order, then the statistics. Rows are
    /// ranked by score, undefined scores last.
    fn write_report(&self, rows: &[ReportRow], output_path: &str) -> Result<(), MomotraderError> {
        let mut param_keys: Vec<String> = Vec::new();
        for row in rows {
            for key in row.params.keys() {
                if !param_keys.iter().any(|k| k == key) {
                    param_keys.push(key.to_string());
                }
            }
        }

        let mut ranked: Vec<&ReportRow> = rows.iter().collect();
        ranked.sort_by(|a, b| match (a.stats.score, b.stats.score) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut wtr = csv::Writer::from_path(output_path)?;
        let header: Vec<&str> = param_keys
            .iter()
            .map(String::as_str)
            .chain(STAT_COLUMNS)
            .collect();
        wtr.write_record(&header)?;

        for row in ranked {
            let params = param_keys
                .iter()
                .map(|k| row.params.get(k).map(|v| v.to_string()).unwrap_or_default());
            let stats = row
                .stats
                .values()
                .into_iter()
                .map(|v| v.map(|v| v.to_string()).unwrap_or_default());
            wtr.write_record(params.chain(stats))?;
        }
        wtr.flush()?;
        info!(path = output_path, rows = rows.len(), "wrote report");
        Ok(())
    }
}
