//! Ordered trade ledger.

use crate::domain::position::Trade;
use std::cmp::Ordering;

/// Trades ordered by exit time, then entry time, then symbol.
///
/// Every cumulative statistic depends on this order, so the ledger can only
/// be built through constructors that sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

fn ledger_order(a: &Trade, b: &Trade) -> Ordering {
    a.exit_time
        .cmp(&b.exit_time)
        .then_with(|| a.entry_time.cmp(&b.entry_time))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

impl TradeLedger {
    pub fn new(mut trades: Vec<Trade>) -> Self {
        trades.sort_by(ledger_order);
        TradeLedger { trades }
    }

    /// Concatenate per-symbol fragments and re-sort globally.
    pub fn merge<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Vec<Trade>>,
    {
        Self::new(fragments.into_iter().flatten().collect())
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Keep the trades matching `keep`; order is preserved.
    pub fn retain(&self, mut keep: impl FnMut(&Trade) -> bool) -> TradeLedger {
        TradeLedger {
            trades: self.trades.iter().filter(|t| keep(t)).cloned().collect(),
        }
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.trades.iter().map(|t| t.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        symbols
    }
}

impl<'a> IntoIterator for &'a TradeLedger {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
