//! Bar data access port trait.

use crate::domain::error::MomotraderError;
use crate::domain::series::BarSeries;

pub trait DataPort {
    /// Load and validate the full bar series of `symbol`.
    fn load_series(&self, symbol: &str) -> Result<BarSeries, MomotraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, MomotraderError>;
}
