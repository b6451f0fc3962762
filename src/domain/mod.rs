//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod filter;
pub mod indicator;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod params;
pub mod position;
pub mod series;
pub mod signal;
pub mod strategy;
pub mod universe;
