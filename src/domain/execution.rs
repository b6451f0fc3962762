//! Per-symbol execution state machine.
//!
//! Turns entry signals and exit rules into filled trades. Fill timing, stop
//! and target triggering and the position lifecycle live here; the only
//! state carried between bars is the explicit [`PositionState`].

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::debug;

use crate::domain::backtest::RunConfig;
use crate::domain::error::MomotraderError;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::series::BarSeries;
use crate::domain::signal::{
    BarContext, EntrySignal, compute_context, evaluate_entry, evaluate_exit, round_price,
};
use crate::domain::strategy::{EntryTiming, PriceBasis, StrategyConfig};

/// When a pending entry fills.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingTrigger {
    /// At the open of the bar after the signal.
    NextOpen,
    /// At the close of the first bar at or after `hour` on the first trading
    /// day after `signal_date`. `fill_date` records that day once seen.
    Deferred {
        signal_date: NaiveDate,
        hour: u32,
        fill_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub signal: EntrySignal,
    pub trigger: PendingTrigger,
}

/// Per-symbol position state threaded through [`ExecutionEngine::step`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Pending(PendingEntry),
    Open(Position),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }
}

/// Result of advancing the state machine by one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: PositionState,
    pub trade: Option<Trade>,
}

impl Step {
    fn hold(state: PositionState) -> Self {
        Step { state, trade: None }
    }
}

/// Simulates one strategy configuration over one symbol's bars.
pub struct ExecutionEngine<'a> {
    series: &'a BarSeries,
    config: &'a StrategyConfig,
    run: &'a RunConfig,
    context: Vec<BarContext>,
}

impl<'a> ExecutionEngine<'a> {
    /// Validate the configuration against the series and precompute the
    /// per-bar day context.
    pub fn new(
        series: &'a BarSeries,
        config: &'a StrategyConfig,
        run: &'a RunConfig,
    ) -> Result<Self, MomotraderError> {
        config.validate()?;
        if series.timeframe() != config.timeframe {
            return Err(MomotraderError::ConfigConflict {
                reason: format!(
                    "variant {} needs {} bars but {} has {} bars",
                    config.variant,
                    config.timeframe,
                    series.symbol(),
                    series.timeframe()
                ),
            });
        }
        Ok(ExecutionEngine {
            series,
            config,
            run,
            context: compute_context(series, run),
        })
    }

    /// Run every bar and return the completed trades in exit order.
    pub fn run(&self) -> Vec<Trade> {
        let mut state = PositionState::Flat;
        let mut trades = Vec::new();
        for index in 0..self.series.len() {
            let step = self.step(state, index);
            trades.extend(step.trade);
            state = step.state;
        }
        match state {
            PositionState::Open(position) => debug!(
                symbol = self.series.symbol(),
                entry_bar = position.entry_bar,
                "series ended with an open position; dropped"
            ),
            PositionState::Pending(pending) => debug!(
                symbol = self.series.symbol(),
                signal_bar = pending.signal.bar,
                "series ended before a pending entry filled"
            ),
            PositionState::Flat => {}
        }
        trades
    }

    /// Advance `state` over bar `index`.
    ///
    /// Order within a bar: exits of an open position, then pending fills,
    /// then entry evaluation. A bar that closed a position never opens one.
    pub fn step(&self, state: PositionState, index: usize) -> Step {
        let step = match state {
            PositionState::Open(position) => self.manage_open(position, index),
            PositionState::Pending(pending) => self.advance_pending(pending, index),
            PositionState::Flat => Step::hold(PositionState::Flat),
        };
        if step.trade.is_some() || !step.state.is_flat() {
            return step;
        }
        Step::hold(self.evaluate_flat(index))
    }

    fn manage_open(&self, position: Position, index: usize) -> Step {
        let bar = &self.series.bars()[index];
        if let Some((price, reason)) = evaluate_exit(&position, bar, self.config.exit_rule) {
            return self.close(position, index, price, reason);
        }
        if self.time_stop_due(&position, index) {
            return self.close(position, index, bar.close, ExitReason::TimeStop);
        }
        Step::hold(PositionState::Open(position))
    }

    fn time_stop_due(&self, position: &Position, index: usize) -> bool {
        if !self.config.time_stop || !self.context[index].new_day {
            return false;
        }
        let held = self.series.bars()[index].date() - position.entry_time.date_naive();
        held.num_days() >= self.run.time_stop_days
    }

    fn close(&self, position: Position, index: usize, price: f64, reason: ExitReason) -> Step {
        let bar = &self.series.bars()[index];
        Step {
            state: PositionState::Flat,
            trade: Some(position.close(index, round_price(price), bar.timestamp, reason)),
        }
    }

    fn advance_pending(&self, pending: PendingEntry, index: usize) -> Step {
        let bar = &self.series.bars()[index];
        match pending.trigger {
            PendingTrigger::NextOpen => {
                let entry_time = bar.timestamp - self.series.timeframe().duration();
                match self.open(pending.signal, index, bar.open, entry_time) {
                    // the whole bar trades after an open fill
                    Some(position) => self.manage_open(position, index),
                    None => Step::hold(PositionState::Flat),
                }
            }
            PendingTrigger::Deferred {
                signal_date,
                hour,
                fill_date,
            } => {
                let date = bar.date();
                if date <= signal_date {
                    return Step::hold(PositionState::Pending(PendingEntry {
                        signal: pending.signal,
                        trigger: PendingTrigger::Deferred {
                            signal_date,
                            hour,
                            fill_date,
                        },
                    }));
                }
                let fill_date = fill_date.unwrap_or(date);
                if date != fill_date {
                    debug!(
                        symbol = self.series.symbol(),
                        signal_bar = pending.signal.bar,
                        %signal_date,
                        hour,
                        "deferred entry lapsed"
                    );
                    return Step::hold(PositionState::Flat);
                }
                if bar.hour() < hour {
                    return Step::hold(PositionState::Pending(PendingEntry {
                        signal: pending.signal,
                        trigger: PendingTrigger::Deferred {
                            signal_date,
                            hour,
                            fill_date: Some(fill_date),
                        },
                    }));
                }
                let signal = pending
                    .signal
                    .anchored_at(round_price(bar.close), self.config);
                match self.open(signal, index, bar.close, bar.timestamp) {
                    Some(position) => Step::hold(PositionState::Open(position)),
                    None => Step::hold(PositionState::Flat),
                }
            }
        }
    }

    fn evaluate_flat(&self, index: usize) -> PositionState {
        let Some(signal) = evaluate_entry(self.series, index, &self.context[index], self.config)
        else {
            return PositionState::Flat;
        };
        let bar = &self.series.bars()[index];

        match (self.config.entry_timing, self.config.price_basis) {
            (EntryTiming::Deferred { hour }, _) => PositionState::Pending(PendingEntry {
                signal,
                trigger: PendingTrigger::Deferred {
                    signal_date: bar.date(),
                    hour,
                    fill_date: None,
                },
            }),
            (EntryTiming::Immediate, PriceBasis::NextOpen) => PositionState::Pending(PendingEntry {
                signal,
                trigger: PendingTrigger::NextOpen,
            }),
            (EntryTiming::Immediate, PriceBasis::SignalClose) => {
                match self.open(signal, index, bar.close, bar.timestamp) {
                    Some(position) => PositionState::Open(position),
                    None => PositionState::Flat,
                }
            }
        }
    }

    /// Fill `signal` at `price` on bar `index`. `None` when the notional
    /// unit buys less than one share.
    fn open(
        &self,
        signal: EntrySignal,
        index: usize,
        price: f64,
        entry_time: DateTime<FixedOffset>,
    ) -> Option<Position> {
        let entry_price = round_price(price);
        let size = position_size(self.run.notional_unit, entry_price);
        if size <= 0 {
            debug!(
                symbol = self.series.symbol(),
                bar = index,
                entry_price,
                "entry skipped: notional buys no shares"
            );
            return None;
        }
        Some(Position {
            symbol: self.series.symbol().to_string(),
            size,
            entry_bar: index,
            entry_price,
            entry_time,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            tag: signal.tag,
        })
    }
}

/// Whole shares bought by `notional` at `price`, rounded to nearest.
pub fn position_size(notional: f64, price: f64) -> i64 {
    if price <= 0.0 {
        return 0;
    }
    (notional / price).round() as i64
}

/// Simulate one symbol under one strategy configuration.
pub fn run_symbol(
    series: &BarSeries,
    config: &StrategyConfig,
    run: &RunConfig,
) -> Result<Vec<Trade>, MomotraderError> {
    Ok(ExecutionEngine::new(series, config, run)?.run())
}
