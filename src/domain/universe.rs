//! Symbol universe: parses symbol lists and loads every symbol's series,
//! isolating per-symbol failures.

use crate::domain::backtest::SymbolFailure;
use crate::domain::error::MomotraderError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::series::BarSeries;
use crate::ports::data_port::DataPort;
use std::collections::HashSet;
use tracing::{info, warn};

/// Parse a comma-separated symbol list. Whitespace is trimmed; empty tokens
/// and duplicates are rejected.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, MomotraderError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let symbol = token.trim();
        if symbol.is_empty() {
            return Err(MomotraderError::invalid("data", "symbols", "empty token in symbol list"));
        }
        if !seen.insert(symbol.to_string()) {
            return Err(MomotraderError::invalid(
                "data",
                "symbols",
                format!("duplicate symbol {symbol}"),
            ));
        }
        symbols.push(symbol.to_string());
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InsufficientBars { bars: usize, minimum: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

/// Loaded series plus the symbols that were skipped or failed to load.
#[derive(Debug)]
pub struct Universe {
    pub series: Vec<BarSeries>,
    pub skipped: Vec<SkippedSymbol>,
    pub failures: Vec<SymbolFailure>,
}

/// Load `symbols` through `data_port`.
///
/// Integrity errors and series at the wrong timeframe are per-symbol
/// failures. Series shorter than `min_bars` are skipped. It is an error
/// only when no symbol survives.
pub fn load_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    timeframe: Timeframe,
    min_bars: usize,
) -> Result<Universe, MomotraderError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();
    let mut failures = Vec::new();

    for symbol in symbols {
        let loaded = data_port.load_series(symbol).and_then(|s| {
            if s.timeframe() == timeframe {
                Ok(s)
            } else {
                Err(MomotraderError::integrity(
                    symbol,
                    format!("expected {timeframe} bars, got {}", s.timeframe()),
                ))
            }
        });
        match loaded {
            Ok(s) if s.len() < min_bars || s.is_empty() => {
                info!(symbol = %symbol, bars = s.len(), minimum = min_bars, "skipping symbol");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::InsufficientBars {
                        bars: s.len(),
                        minimum: min_bars,
                    },
                });
            }
            Ok(s) => series.push(s),
            Err(error) => {
                warn!(symbol = %symbol, %error, "failed to load symbol");
                failures.push(SymbolFailure {
                    symbol: symbol.clone(),
                    error,
                });
            }
        }
    }

    if series.is_empty() {
        return Err(MomotraderError::NoData {
            symbol: "all".to_string(),
        });
    }

    info!(
        loaded = series.len(),
        skipped = skipped.len(),
        failed = failures.len(),
        "universe loaded"
    );

    Ok(Universe {
        series,
        skipped,
        failures,
    })
}
