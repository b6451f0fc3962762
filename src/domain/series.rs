//! Validated per-symbol bar series.

use crate::domain::error::MomotraderError;
use crate::domain::ohlcv::{Bar, Timeframe};

/// Bars for one symbol at a fixed timeframe, strictly increasing in time.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate and wrap already-ordered bars.
    ///
    /// Duplicate or out-of-order timestamps, non-finite prices and bars
    /// belonging to another symbol are integrity errors for this symbol.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, MomotraderError> {
        let symbol = symbol.into();

        for (i, bar) in bars.iter().enumerate() {
            if bar.symbol != symbol {
                return Err(MomotraderError::integrity(
                    &symbol,
                    format!("bar {i} belongs to {}", bar.symbol),
                ));
            }
            let prices = [bar.open, bar.high, bar.low, bar.close, bar.volume];
            if prices.iter().any(|p| !p.is_finite()) {
                return Err(MomotraderError::integrity(
                    &symbol,
                    format!("non-finite value in bar {i} ({})", bar.timestamp),
                ));
            }
            if bar.high < bar.low {
                return Err(MomotraderError::integrity(
                    &symbol,
                    format!("high below low in bar {i} ({})", bar.timestamp),
                ));
            }
            if i > 0 {
                let prev = &bars[i - 1].timestamp;
                if bar.timestamp == *prev {
                    return Err(MomotraderError::integrity(
                        &symbol,
                        format!("duplicate timestamp {} at bar {i}", bar.timestamp),
                    ));
                }
                if bar.timestamp < *prev {
                    return Err(MomotraderError::integrity(
                        &symbol,
                        format!(
                            "timestamp {} at bar {i} precedes {}",
                            bar.timestamp, prev
                        ),
                    ));
                }
            }
        }

        Ok(Self {
            symbol,
            timeframe,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
