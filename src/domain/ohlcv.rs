//! OHLCV bar representation.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Timelike};
use std::fmt;
use std::str::FromStr;

/// Bar interval of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Daily,
    Hourly,
}

impl Timeframe {
    pub fn duration(self) -> TimeDelta {
        match self {
            Timeframe::Daily => TimeDelta::days(1),
            Timeframe::Hourly => TimeDelta::hours(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Daily => write!(f, "daily"),
            Timeframe::Hourly => write!(f, "hourly"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "1d" | "d" => Ok(Timeframe::Daily),
            "hourly" | "1h" | "h" => Ok(Timeframe::Hourly),
            other => Err(format!("unknown timeframe {other:?} (expected daily or hourly)")),
        }
    }
}

/// One OHLCV sample. `timestamp` is the bar close time in the exchange's
/// local offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Local calendar date of the bar.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Local hour of the bar.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}
