//! CSV bar data adapter: one `<SYMBOL>.csv` file per symbol.

use crate::domain::error::MomotraderError;
use crate::domain::ohlcv::{Bar, Timeframe};
use crate::domain::series::BarSeries;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

const TIME_COLUMNS: &[&str] = &["datetime", "timestamp", "date", "time"];
const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
    timeframe: Timeframe,
    utc_offset: FixedOffset,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, timeframe: Timeframe, utc_offset: FixedOffset) -> Self {
        Self {
            base_path,
            timeframe,
            utc_offset,
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn parse_timestamp(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts);
        }
        if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
            return Some(ts);
        }
        let naive = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        self.utc_offset.from_local_datetime(&naive).single()
    }
}

fn column_index(
    headers: &csv::StringRecord,
    names: &[&str],
    symbol: &str,
) -> Result<usize, MomotraderError> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        .ok_or_else(|| MomotraderError::MissingColumn {
            symbol: symbol.to_string(),
            column: names[0].to_string(),
        })
}

impl DataPort for CsvAdapter {
    /// Rows are taken in file order; ordering problems surface as integrity
    /// errors from [`BarSeries::new`].
    fn load_series(&self, symbol: &str) -> Result<BarSeries, MomotraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MomotraderError::NoData {
                symbol: symbol.to_string(),
            },
            _ => MomotraderError::Io(e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers()?.clone();
        let time_idx = column_index(&headers, TIME_COLUMNS, symbol)?;
        let mut price_idx = [0usize; 5];
        for (slot, name) in price_idx.iter_mut().zip(PRICE_COLUMNS) {
            *slot = column_index(&headers, &[name], symbol)?;
        }

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let raw_ts = record.get(time_idx).unwrap_or_default();
            let timestamp = self.parse_timestamp(raw_ts).ok_or_else(|| {
                MomotraderError::integrity(symbol, format!("row {row}: invalid timestamp {raw_ts:?}"))
            })?;

            let mut values = [0.0f64; 5];
            for ((value, idx), name) in values.iter_mut().zip(price_idx).zip(PRICE_COLUMNS) {
                let raw = record.get(idx).unwrap_or_default().trim();
                *value = raw.parse().map_err(|_| {
                    MomotraderError::integrity(symbol, format!("row {row}: invalid {name} value {raw:?}"))
                })?;
            }
            let [open, high, low, close, volume] = values;

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded bars");
        BarSeries::new(symbol, self.timeframe, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, MomotraderError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
