//! Post-run ledger filtering by threshold predicates on trade tags.
//!
//! A filter grid holds, per tag key, a list of predicates such as `>=3`.
//! Every combination (one predicate per key) yields a filtered ledger whose
//! identifier is the predicate thresholds followed by the run's own
//! parameters.

use crate::domain::error::MomotraderError;
use crate::domain::ledger::TradeLedger;
use crate::domain::params::ParameterSet;
use crate::domain::position::Trade;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Eq => "==",
        }
    }

    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Eq => lhs == rhs,
        }
    }
}

/// `tag[key] <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPredicate {
    pub key: String,
    pub op: CmpOp,
    pub value: f64,
}

impl FilterPredicate {
    /// Parse an expression like `>=3` or `< 0.5` for `key`.
    pub fn parse(key: &str, expr: &str) -> Result<Self, MomotraderError> {
        let expr = expr.trim();
        let (op, rest) = [CmpOp::Ge, CmpOp::Le, CmpOp::Eq, CmpOp::Gt, CmpOp::Lt]
            .into_iter()
            .find_map(|op| expr.strip_prefix(op.symbol()).map(|rest| (op, rest)))
            .ok_or_else(|| {
                MomotraderError::invalid(
                    "filter",
                    key,
                    format!("{expr:?} must start with one of >=, <=, ==, >, <"),
                )
            })?;
        let value: f64 = rest.trim().parse().map_err(|_| {
            MomotraderError::invalid("filter", key, format!("{expr:?} has no numeric threshold"))
        })?;
        if !value.is_finite() {
            return Err(MomotraderError::invalid(
                "filter",
                key,
                format!("{expr:?} threshold must be finite"),
            ));
        }
        Ok(FilterPredicate {
            key: key.to_string(),
            op,
            value,
        })
    }

    /// Trades without a numeric tag value for the key never match.
    pub fn matches(&self, trade: &Trade) -> bool {
        trade
            .tag
            .get(&self.key)
            .and_then(|v| v.as_f64())
            .is_some_and(|v| self.op.holds(v, self.value))
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.op.symbol(), self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGrid {
    axes: Vec<(String, Vec<FilterPredicate>)>,
}

impl FilterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key with comma-separated predicate expressions, e.g. `>=3,>=5`.
    pub fn push_exprs(&mut self, key: &str, exprs: &str) -> Result<(), MomotraderError> {
        let predicates = exprs
            .split(',')
            .filter(|e| !e.trim().is_empty())
            .map(|e| FilterPredicate::parse(key, e))
            .collect::<Result<Vec<_>, _>>()?;
        if predicates.is_empty() {
            return Err(MomotraderError::invalid("filter", key, "needs at least one predicate"));
        }
        if self.axes.iter().any(|(k, _)| k == key) {
            return Err(MomotraderError::invalid("filter", key, "listed twice"));
        }
        self.axes.push((key.to_string(), predicates));
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Reject keys a trade tag cannot carry.
    pub fn validate(&self, known: &[&str]) -> Result<(), MomotraderError> {
        match self.keys().find(|k| !known.contains(k)) {
            Some(key) => Err(MomotraderError::UnknownParameter {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// One predicate per key, last key varying fastest.
    pub fn combinations(&self) -> Vec<Vec<FilterPredicate>> {
        let mut combos: Vec<Vec<FilterPredicate>> = vec![Vec::new()];
        for (_, predicates) in &self.axes {
            combos = combos
                .iter()
                .flat_map(|combo| {
                    predicates.iter().map(move |p| {
                        let mut next = combo.clone();
                        next.push(p.clone());
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

/// A ledger restricted by one predicate combination.
#[derive(Debug, Clone)]
pub struct FilteredLedger {
    pub params: ParameterSet,
    pub predicates: Vec<FilterPredicate>,
    pub ledger: TradeLedger,
}

/// Apply every combination of `grid` to `ledger`. `run_params` are the
/// parameters the ledger was produced with; they follow the predicate
/// thresholds in each identifier, minus keys the grid overrides.
pub fn apply_filter_grid(
    ledger: &TradeLedger,
    grid: &FilterGrid,
    run_params: &ParameterSet,
) -> Result<Vec<FilteredLedger>, MomotraderError> {
    grid.combinations()
        .into_iter()
        .map(|predicates| {
            let thresholds =
                ParameterSet::from_pairs(predicates.iter().map(|p| (p.key.clone(), p.value)))?;
            let filtered = ledger.retain(|t| predicates.iter().all(|p| p.matches(t)));
            Ok(FilteredLedger {
                params: thresholds.merged(run_params),
                predicates,
                ledger: filtered,
            })
        })
        .collect()
}
