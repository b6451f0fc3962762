//! Run configuration and the parameter-grid driver.
//!
//! Each (parameter set, symbol) pair is an independent simulation; the grid
//! runs them on the rayon pool and merges per-symbol fragments into one
//! ledger per parameter set.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::error::MomotraderError;
use crate::domain::execution::run_symbol;
use crate::domain::ledger::TradeLedger;
use crate::domain::params::ParameterSet;
use crate::domain::position::Trade;
use crate::domain::series::BarSeries;
use crate::domain::strategy::{FillPolicy, StrategyConfig, StrategyParams, Variant};

/// Run-level settings shared by every simulation in a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub variant: Variant,
    pub fill_policy: FillPolicy,
    /// Dollar amount behind every position.
    pub notional_unit: f64,
    /// SMA window of daily volume for daily variants.
    pub volume_window: usize,
    /// SMA window, in hourly bars, of day-to-date volume.
    pub intraday_volume_window: usize,
    /// Hour whose bar evaluates intraday entries.
    pub signal_hour: u32,
    pub time_stop_days: i64,
    /// Symbols with fewer bars are skipped.
    pub min_bars: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            variant: Variant::Hourly,
            fill_policy: Variant::Hourly.fill_policy(),
            notional_unit: 1000.0,
            volume_window: 14,
            intraday_volume_window: 16 * 14,
            signal_hour: 15,
            time_stop_days: 5,
            min_bars: 0,
        }
    }
}

impl RunConfig {
    /// Defaults for `variant`, with its natural fill policy.
    pub fn for_variant(variant: Variant) -> Self {
        RunConfig {
            variant,
            fill_policy: variant.fill_policy(),
            ..RunConfig::default()
        }
    }

    /// Strategy configuration for `params` under this run's fill policy.
    pub fn strategy(&self, params: StrategyParams) -> StrategyConfig {
        let mut config = self.variant.build(params, self.signal_hour);
        config.fill_policy = self.fill_policy;
        config
    }

    /// Resolve and validate the strategy for one parameter set.
    pub fn strategy_for(&self, set: &ParameterSet) -> Result<StrategyConfig, MomotraderError> {
        let config = self.strategy(self.variant.params_from_set(set)?);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MomotraderError> {
        if self.notional_unit.is_nan() || self.notional_unit <= 0.0 {
            return Err(MomotraderError::invalid(
                "run",
                "notional_unit",
                "must be positive",
            ));
        }
        if self.volume_window == 0 {
            return Err(MomotraderError::invalid("run", "volume_window", "must be at least 1"));
        }
        if self.intraday_volume_window == 0 {
            return Err(MomotraderError::invalid(
                "run",
                "intraday_volume_window",
                "must be at least 1",
            ));
        }
        if self.signal_hour > 23 {
            return Err(MomotraderError::invalid("run", "signal_hour", "must be in 0..=23"));
        }
        if self.time_stop_days < 1 {
            return Err(MomotraderError::invalid("run", "time_stop_days", "must be at least 1"));
        }
        Ok(())
    }
}

/// Ordered parameter axes. The cartesian product varies the last axis
/// fastest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<f64>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, values: Vec<f64>) -> Result<(), MomotraderError> {
        let key = key.into();
        if values.is_empty() {
            return Err(MomotraderError::invalid("grid", &key, "needs at least one value"));
        }
        if self.axes.iter().any(|(k, _)| *k == key) {
            return Err(MomotraderError::invalid("grid", &key, "listed twice"));
        }
        self.axes.push((key, values));
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(k, _)| k.as_str())
    }

    /// Number of parameter sets; an empty grid has one (empty) set.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    pub fn parameter_sets(&self) -> Result<Vec<ParameterSet>, MomotraderError> {
        let mut sets = vec![ParameterSet::new()];
        for (key, values) in &self.axes {
            let mut next = Vec::with_capacity(sets.len() * values.len());
            for set in &sets {
                for value in values {
                    let mut extended = set.clone();
                    extended.insert(key.as_str(), *value)?;
                    next.push(extended);
                }
            }
            sets = next;
        }
        Ok(sets)
    }
}

/// A symbol whose simulation or loading failed; other symbols carry on.
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: MomotraderError,
}

/// Outcome of one parameter set across all symbols.
#[derive(Debug)]
pub struct GridRun {
    pub params: ParameterSet,
    pub ledger: TradeLedger,
    pub failures: Vec<SymbolFailure>,
}

/// Simulate every parameter set over every series.
///
/// All parameter sets are resolved and validated before any simulation
/// starts; a bad set fails the whole call. Per-symbol failures are isolated
/// into [`GridRun::failures`].
pub fn run_grid(
    series: &[BarSeries],
    sets: &[ParameterSet],
    run: &RunConfig,
) -> Result<Vec<GridRun>, MomotraderError> {
    run.validate()?;
    let configs = sets
        .iter()
        .map(|set| run.strategy_for(set))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        variant = %run.variant,
        parameter_sets = sets.len(),
        symbols = series.len(),
        "running grid"
    );

    let jobs: Vec<(usize, &BarSeries)> = (0..configs.len())
        .flat_map(|i| series.iter().map(move |s| (i, s)))
        .collect();

    let outcomes: Vec<(usize, &str, Result<Vec<Trade>, MomotraderError>)> = jobs
        .par_iter()
        .map(|&(i, s)| (i, s.symbol(), run_symbol(s, &configs[i], run)))
        .collect();

    let mut fragments: Vec<Vec<Vec<Trade>>> = (0..configs.len()).map(|_| Vec::new()).collect();
    let mut failures: Vec<Vec<SymbolFailure>> = (0..configs.len()).map(|_| Vec::new()).collect();
    for (i, symbol, outcome) in outcomes {
        match outcome {
            Ok(trades) => fragments[i].push(trades),
            Err(error) => {
                warn!(symbol, params = %sets[i], %error, "symbol failed");
                failures[i].push(SymbolFailure {
                    symbol: symbol.to_string(),
                    error,
                });
            }
        }
    }

    Ok(sets
        .iter()
        .zip(fragments)
        .zip(failures)
        .map(|((set, fragments), failures)| {
            let ledger = TradeLedger::merge(fragments);
            info!(params = %set, trades = ledger.len(), failed = failures.len(), "parameter set done");
            GridRun {
                params: set.clone(),
                ledger,
                failures,
            }
        })
        .collect())
}
