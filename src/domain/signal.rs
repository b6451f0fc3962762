//! Signal generation: per-bar day context, entry decisions and exit rules.
//!
//! Everything here is a pure function of the bar history and the current
//! position; carried state lives in the execution engine's `PositionState`.

use crate::domain::backtest::RunConfig;
use crate::domain::indicator::sma;
use crate::domain::ohlcv::{Bar, Timeframe};
use crate::domain::position::{ExitReason, Position, Tag, TagValue};
use crate::domain::series::BarSeries;
use crate::domain::strategy::{ExitRule, FIB_RATIOS, StopRule, StrategyConfig};
use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::debug;

/// Round a price to the fill precision (3 decimals).
pub fn round_price(price: f64) -> f64 {
    (price * 1000.0).round() / 1000.0
}

/// Running trading-day aggregates as of a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarContext {
    pub day_high: f64,
    pub day_low: f64,
    pub day_volume: f64,
    /// Close the day's move is measured from.
    pub reference_close: Option<f64>,
    pub avg_volume: Option<f64>,
    /// First bar of a trading day.
    pub new_day: bool,
    /// Entry conditions are evaluated on this bar.
    pub signal_bar: bool,
}

/// Compute the day context for every bar of `series`.
///
/// Daily bars: each bar is its own day, the reference is the prior close and
/// the average is an SMA of bar volume over `volume_window`.
///
/// Hourly bars: high/low/volume accumulate over the trading day, entry is
/// evaluated at `signal_hour`, the reference is the close of the previous
/// day's signal bar and the average is an SMA over `intraday_volume_window`
/// hourly points of the last completed day's total volume. Bars of the
/// first day have no completed day and no average.
pub fn compute_context(series: &BarSeries, run: &RunConfig) -> Vec<BarContext> {
    let bars = series.bars();
    match series.timeframe() {
        Timeframe::Daily => {
            let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
            let avg = sma(&volumes, run.volume_window);
            bars.iter()
                .enumerate()
                .map(|(i, bar)| BarContext {
                    day_high: bar.high,
                    day_low: bar.low,
                    day_volume: bar.volume,
                    reference_close: i.checked_sub(1).map(|p| bars[p].close),
                    avg_volume: avg[i],
                    new_day: true,
                    signal_bar: true,
                })
                .collect()
        }
        Timeframe::Hourly => {
            let mut out: Vec<BarContext> = Vec::with_capacity(bars.len());
            let mut prev_day_close = bars.first().map(|b| b.close);
            let mut prev_date: Option<NaiveDate> = None;
            let mut completed_day: Option<f64> = None;
            let mut completed: Vec<Option<f64>> = Vec::with_capacity(bars.len());

            for bar in bars {
                let new_day = prev_date != Some(bar.date());
                if new_day {
                    if let Some(last) = out.last() {
                        completed_day = Some(last.day_volume);
                    }
                }
                completed.push(completed_day);
                let (day_high, day_low, day_volume) = match out.last() {
                    Some(last) if !new_day => (
                        last.day_high.max(bar.high),
                        last.day_low.min(bar.low),
                        last.day_volume + bar.volume,
                    ),
                    _ => (bar.high, bar.low, bar.volume),
                };
                let signal_bar = bar.hour() == run.signal_hour;
                out.push(BarContext {
                    day_high,
                    day_low,
                    day_volume,
                    reference_close: prev_day_close,
                    avg_volume: None,
                    new_day,
                    signal_bar,
                });
                if signal_bar {
                    prev_day_close = Some(bar.close);
                }
                prev_date = Some(bar.date());
            }

            if let Some(first) = completed.iter().position(Option::is_some) {
                let totals: Vec<f64> = completed[first..].iter().flatten().copied().collect();
                for (ctx, avg) in out[first..]
                    .iter_mut()
                    .zip(sma(&totals, run.intraday_volume_window))
                {
                    ctx.avg_volume = avg;
                }
            }
            out
        }
    }
}

/// The three ratios behind the entry trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalValues {
    pub day_net_change: f64,
    pub rvol: f64,
    pub pullback: f64,
}

impl SignalValues {
    /// `None` when any ratio is undefined: no reference close, no volume
    /// average (or a zero one), or a zero-range day.
    pub fn compute(bar: &Bar, ctx: &BarContext) -> Option<SignalValues> {
        let reference = ctx.reference_close.filter(|c| *c > 0.0)?;
        let avg_volume = ctx.avg_volume.filter(|v| *v > 0.0)?;
        let range = ctx.day_high - ctx.day_low;
        if range <= 0.0 {
            return None;
        }
        Some(SignalValues {
            day_net_change: (ctx.day_high - reference) / reference,
            rvol: ctx.day_volume / avg_volume,
            pullback: (ctx.day_high - bar.close) / range,
        })
    }
}

/// An entry decision produced on a signal bar.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    pub bar: usize,
    pub time: DateTime<FixedOffset>,
    pub close: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub tag: Tag,
}

impl EntrySignal {
    /// Move percent-based stop and target onto `fill_price`, for entries
    /// that fill away from the signal close. Fib stops keep the signal day's
    /// range.
    pub fn anchored_at(mut self, fill_price: f64, config: &StrategyConfig) -> EntrySignal {
        let p = &config.params;
        match config.stop_rule {
            StopRule::None => return self,
            StopRule::Percent => {
                self.stop_loss = Some(percent_stop(fill_price, p.sl_prc));
                self.take_profit = Some(percent_target(fill_price, p.sl_prc, p.reward));
            }
            StopRule::Fibonacci { .. } => {
                self.take_profit = Some(percent_target(fill_price, p.sl_prc, p.reward));
            }
        }
        if let Some(sl) = self.stop_loss {
            self.tag.insert("sl".into(), sl.into());
        }
        if let Some(tp) = self.take_profit {
            self.tag.insert("tp".into(), tp.into());
        }
        self
    }
}

fn percent_stop(price: f64, sl_prc: f64) -> f64 {
    round_price(price * (1.0 - sl_prc))
}

fn percent_target(price: f64, sl_prc: f64, reward: f64) -> f64 {
    round_price(price * (1.0 + sl_prc * reward))
}

/// Decide whether bar `index` triggers an entry. The caller guarantees the
/// symbol is flat.
pub fn evaluate_entry(
    series: &BarSeries,
    index: usize,
    ctx: &BarContext,
    config: &StrategyConfig,
) -> Option<EntrySignal> {
    if !ctx.signal_bar {
        return None;
    }
    let bar = &series.bars()[index];
    let values = SignalValues::compute(bar, ctx)?;
    let p = &config.params;

    let triggered =
        values.rvol > p.rvol && values.day_net_change > p.day_net_change && values.pullback < p.pullback;
    if !triggered {
        return None;
    }

    let (stop_loss, take_profit) = match levels(bar, ctx, config) {
        Some(levels) => levels,
        None => {
            debug!(
                symbol = series.symbol(),
                bar = index,
                "entry skipped: no fib stop below the close"
            );
            return None;
        }
    };

    let mut tag = Tag::new();
    tag.insert("day_net_change".into(), values.day_net_change.into());
    tag.insert("rvol".into(), values.rvol.into());
    tag.insert("pullback".into(), values.pullback.into());
    for key in config.variant.param_keys() {
        if tag.contains_key(*key) {
            continue;
        }
        let value = match *key {
            "entry_hour" => TagValue::Int(p.entry_hour as i64),
            "fibo" => TagValue::Int(p.fibo as i64),
            other => match p.get(other) {
                Some(v) => TagValue::Float(v),
                None => continue,
            },
        };
        tag.insert((*key).to_string(), value);
    }
    if let Some(sl) = stop_loss {
        tag.insert("sl".into(), sl.into());
    }
    if let Some(tp) = take_profit {
        tag.insert("tp".into(), tp.into());
    }

    Some(EntrySignal {
        bar: index,
        time: bar.timestamp,
        close: bar.close,
        stop_loss,
        take_profit,
        tag,
    })
}

/// Stop and target for an entry at the signal close. The outer `None`
/// rejects the entry.
fn levels(bar: &Bar, ctx: &BarContext, config: &StrategyConfig) -> Option<(Option<f64>, Option<f64>)> {
    let p = &config.params;
    let target = || Some(percent_target(bar.close, p.sl_prc, p.reward));
    match config.stop_rule {
        StopRule::None => Some((None, None)),
        StopRule::Percent => Some((Some(percent_stop(bar.close, p.sl_prc)), target())),
        StopRule::Fibonacci { level } => {
            let stop = fib_stop(ctx.day_high, ctx.day_low, bar.close, level)?;
            Some((Some(stop), target()))
        }
    }
}

/// Fib-retracement stop for `level`, falling back one level when the stop
/// is not below `entry`. Level 0 has nothing to fall back to, and a fallback
/// that is still not below `entry` also rejects the entry.
pub fn fib_stop(high: f64, low: f64, entry: f64, level: usize) -> Option<f64> {
    let at = |lvl: usize| round_price(low + FIB_RATIOS[lvl] * (high - low));
    let stop = at(level.min(FIB_RATIOS.len() - 1));
    if stop < entry {
        return Some(stop);
    }
    let fallback = at(level.checked_sub(1)?);
    (fallback < entry).then_some(fallback)
}

/// Exit instruction for an open position on a bar that lies entirely after
/// its fill. `None` keeps the position open.
pub fn evaluate_exit(position: &Position, bar: &Bar, rule: ExitRule) -> Option<(f64, ExitReason)> {
    let triggered = if position.should_stop_loss(bar.low) {
        position.stop_loss.map(|sl| (sl, ExitReason::StopLoss))
    } else if position.should_take_profit(bar.high) {
        position.take_profit.map(|tp| (tp, ExitReason::TakeProfit))
    } else {
        None
    };

    match rule {
        ExitRule::NextClose => Some((bar.close, ExitReason::Close)),
        ExitRule::NextCloseWithStops => triggered.or(Some((bar.close, ExitReason::Close))),
        ExitRule::Bracket => triggered,
    }
}
