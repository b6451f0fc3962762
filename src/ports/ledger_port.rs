//! Trade ledger and summary report persistence port.

use crate::domain::error::MomotraderError;
use crate::domain::ledger::TradeLedger;
use crate::domain::metrics::Stats;
use crate::domain::params::ParameterSet;

/// One row of the summary report.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub params: ParameterSet,
    pub stats: Stats,
}

pub trait LedgerPort {
    /// Persist the ledger of the run identified by `params`.
    fn write_ledger(&self, params: &ParameterSet, ledger: &TradeLedger)
    -> Result<(), MomotraderError>;

    fn read_ledger(&self, params: &ParameterSet) -> Result<TradeLedger, MomotraderError>;

    /// Identifiers of every stored ledger.
    fn list_ledgers(&self) -> Result<Vec<ParameterSet>, MomotraderError>;

    fn write_report(&self, rows: &[ReportRow], output_path: &str) -> Result<(), MomotraderError>;
}
