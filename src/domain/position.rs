//! Positions, completed trades and their metadata tags.

use chrono::{DateTime, FixedOffset, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Scalar stored in a trade tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TagValue {
    /// Numeric view used by filters and analytics.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Int(v) => Some(*v as f64),
            TagValue::Float(v) => Some(*v),
            TagValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Text(v.to_string())
    }
}

/// Flat key -> scalar metadata carried from signal to trade.
pub type Tag = BTreeMap<String, TagValue>;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Close,
    StopLoss,
    TakeProfit,
    TimeStop,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Close => "close",
            ExitReason::StopLoss => "sl",
            ExitReason::TakeProfit => "tp",
            ExitReason::TimeStop => "time",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "close" => Ok(ExitReason::Close),
            "sl" => Ok(ExitReason::StopLoss),
            "tp" => Ok(ExitReason::TakeProfit),
            "time" => Ok(ExitReason::TimeStop),
            other => Err(format!("unknown exit reason {other:?}")),
        }
    }
}

/// An open position. At most one exists per symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub size: i64,
    pub entry_bar: usize,
    pub entry_price: f64,
    pub entry_time: DateTime<FixedOffset>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub tag: Tag,
}

impl Position {
    pub fn should_stop_loss(&self, low: f64) -> bool {
        self.stop_loss.is_some_and(|sl| low <= sl)
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        self.take_profit.is_some_and(|tp| high >= tp)
    }

    /// Consume the position into a completed trade. The tag gains the exit
    /// reason and exit price and is frozen from here on.
    pub fn close(
        self,
        exit_bar: usize,
        exit_price: f64,
        exit_time: DateTime<FixedOffset>,
        reason: ExitReason,
    ) -> Trade {
        let mut tag = self.tag;
        tag.insert("exit_reason".into(), reason.as_str().into());
        tag.insert("exit".into(), exit_price.into());
        Trade {
            pnl: self.size as f64 * (exit_price - self.entry_price),
            symbol: self.symbol,
            size: self.size,
            entry_bar: self.entry_bar,
            exit_bar,
            entry_price: self.entry_price,
            exit_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            entry_time: self.entry_time,
            exit_time,
            tag,
        }
    }
}

/// A completed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub size: i64,
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub pnl: f64,
    pub entry_time: DateTime<FixedOffset>,
    pub exit_time: DateTime<FixedOffset>,
    pub tag: Tag,
}

impl Trade {
    pub fn duration(&self) -> TimeDelta {
        self.exit_time - self.entry_time
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.tag
            .get("exit_reason")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Capital tied up by the position while it was open.
    pub fn notional(&self) -> f64 {
        self.size as f64 * self.entry_price
    }
}
