//! Rolling indicators over bar-derived value series.

pub mod sma;

pub use sma::sma;
