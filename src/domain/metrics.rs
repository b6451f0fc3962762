//! Trade analytics: equity curves, drawdown, capital usage and the summary
//! statistics used to rank parameter sets.
//!
//! Every computation walks the ledger in exit order. Statistics that are
//! undefined for a ledger (empty subsets, single samples, zero spans) are
//! `None` and never abort the record.

use crate::domain::indicator::sma;
use crate::domain::ledger::TradeLedger;
use crate::domain::params::ParameterSet;
use crate::domain::position::{ExitReason, Trade};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Optional PnL reconciliation applied before any statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMode {
    #[default]
    None,
    /// Cap PnL at the stop-loss risk and the reward multiple of it, plus a
    /// slack allowance.
    Simple,
    /// Re-price stop and target exits at their levels.
    StopTarget,
}

impl FromStr for TrimMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(TrimMode::None),
            "simple" => Ok(TrimMode::Simple),
            "sltp" | "sl/tp" => Ok(TrimMode::StopTarget),
            other => Err(format!("unknown trim mode {other:?} (expected none, simple or sltp)")),
        }
    }
}

impl fmt::Display for TrimMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrimMode::None => write!(f, "none"),
            TrimMode::Simple => write!(f, "simple"),
            TrimMode::StopTarget => write!(f, "sltp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    pub commission_per_share: f64,
    pub notional_unit: f64,
    pub winrate_window: usize,
    pub trading_days: f64,
    /// Account equity the net equity curve starts from.
    pub starting_equity: f64,
    pub trim: TrimMode,
    pub trim_slack: f64,
    pub epsilon: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            commission_per_share: 0.014,
            notional_unit: 1000.0,
            winrate_window: 100,
            trading_days: 252.0,
            starting_equity: 10_000.0,
            trim: TrimMode::None,
            trim_slack: 0.0,
            epsilon: 1e-6,
        }
    }
}

/// PnL of `trade` after the configured trim.
///
/// `Simple` needs `sl_prc` and `reward` in `params`; without them the PnL
/// passes through.
pub fn adjusted_pnl(trade: &Trade, params: &ParameterSet, config: &AnalyticsConfig) -> f64 {
    match config.trim {
        TrimMode::None => trade.pnl,
        TrimMode::Simple => match (params.get("sl_prc"), params.get("reward")) {
            (Some(sl_prc), Some(reward)) => cap_pnl(
                trade.pnl,
                sl_prc * config.notional_unit,
                reward,
                config.trim_slack,
            ),
            _ => trade.pnl,
        },
        TrimMode::StopTarget => {
            let level = match trade.exit_reason() {
                Some(ExitReason::StopLoss) => trade.stop_loss.or_else(|| tag_f64(trade, "sl")),
                Some(ExitReason::TakeProfit) => {
                    trade.take_profit.or_else(|| tag_f64(trade, "tp"))
                }
                _ => None,
            };
            match level {
                Some(price) => trade.size as f64 * (price - trade.entry_price),
                None => trade.pnl,
            }
        }
    }
}

fn tag_f64(trade: &Trade, key: &str) -> Option<f64> {
    trade.tag.get(key).and_then(|v| v.as_f64())
}

/// Clamp `pnl` to `[-risk, risk * reward]` once it leaves that band by more
/// than `slack`.
pub fn cap_pnl(pnl: f64, risk: f64, reward: f64, slack: f64) -> f64 {
    if pnl < -risk - slack {
        -risk
    } else if pnl > risk * reward + slack {
        risk * reward
    } else {
        pnl
    }
}

/// Running sum of `pnls`.
pub fn equity_curve(pnls: &[f64]) -> Vec<f64> {
    pnls.iter()
        .scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        })
        .collect()
}

/// `running_max(equity) - equity`, pointwise.
pub fn drawdown(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            peak - e
        })
        .collect()
}

/// Longest run of consecutive losing trades (PnL < 0).
pub fn max_losing_streak(pnls: &[f64]) -> usize {
    let mut best = 0;
    let mut current = 0;
    for &p in pnls {
        if p < 0.0 {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Capital deployed over time: `+size*entry_price` at entry, the same
/// amount back at exit, cumulatively summed in time order. Exits sort
/// before entries at the same instant.
pub fn used_buying_power(trades: &[Trade]) -> Vec<(DateTime<FixedOffset>, f64)> {
    let mut events: Vec<(DateTime<FixedOffset>, f64)> = trades
        .iter()
        .flat_map(|t| {
            let cost = t.notional();
            [(t.entry_time, cost), (t.exit_time, -cost)]
        })
        .collect();
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut used = 0.0;
    events
        .into_iter()
        .map(|(time, change)| {
            used += change;
            (time, used)
        })
        .collect()
}

/// Rolling win rate over `window` trades; `None` until the window fills.
pub fn winrate_ma(pnls: &[f64], window: usize) -> Vec<Option<f64>> {
    let wins: Vec<f64> = pnls.iter().map(|&p| if p > 0.0 { 1.0 } else { 0.0 }).collect();
    sma(&wins, window)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1).
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Plot-ready series for one ledger, all in exit order.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSeries {
    pub exit_times: Vec<DateTime<FixedOffset>>,
    pub pnl: Vec<f64>,
    pub net_pnl: Vec<f64>,
    pub equity: Vec<f64>,
    pub net_equity: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub winrate_ma: Vec<Option<f64>>,
    pub used_bp: Vec<(DateTime<FixedOffset>, f64)>,
}

impl TradeSeries {
    pub fn compute(ledger: &TradeLedger, params: &ParameterSet, config: &AnalyticsConfig) -> Self {
        let trades = ledger.trades();
        let pnl: Vec<f64> = trades.iter().map(|t| adjusted_pnl(t, params, config)).collect();
        let net_pnl: Vec<f64> = trades
            .iter()
            .zip(&pnl)
            .map(|(t, p)| p - t.size as f64 * config.commission_per_share)
            .collect();
        let equity = equity_curve(&pnl);
        let net_equity = equity_curve(&net_pnl)
            .into_iter()
            .map(|e| config.starting_equity + e)
            .collect();
        TradeSeries {
            exit_times: trades.iter().map(|t| t.exit_time).collect(),
            drawdown: drawdown(&equity),
            winrate_ma: winrate_ma(&pnl, config.winrate_window),
            used_bp: used_buying_power(trades),
            pnl,
            net_pnl,
            equity,
            net_equity,
        }
    }
}

/// Column names of [`Stats::values`], in order.
pub const STAT_COLUMNS: [&str; 19] = [
    "pnl",
    "net_pnl",
    "winrate",
    "total_trades",
    "total_volume",
    "max_lossing_streak",
    "max_drawdown",
    "max_used_bp",
    "sqn",
    "std_profit",
    "std_loss",
    "avg_profit",
    "avg_loss",
    "avg_day_profit",
    "std_day_profit",
    "cagr",
    "sharpe",
    "ulcer",
    "score",
];

/// Summary statistics of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub pnl: f64,
    pub net_pnl: f64,
    pub winrate: Option<f64>,
    pub total_trades: usize,
    pub total_volume: i64,
    pub max_lossing_streak: usize,
    pub max_drawdown: Option<f64>,
    pub max_used_bp: Option<f64>,
    pub sqn: Option<f64>,
    pub std_profit: Option<f64>,
    pub std_loss: Option<f64>,
    pub avg_profit: Option<f64>,
    pub avg_loss: Option<f64>,
    pub avg_day_profit: Option<f64>,
    pub std_day_profit: Option<f64>,
    pub cagr: Option<f64>,
    pub sharpe: Option<f64>,
    pub ulcer: Option<f64>,
    pub score: Option<f64>,
}

impl Stats {
    pub fn compute(ledger: &TradeLedger, params: &ParameterSet, config: &AnalyticsConfig) -> Self {
        let series = TradeSeries::compute(ledger, params, config);
        let trades = ledger.trades();
        let n = trades.len();

        let wins: Vec<f64> = series.pnl.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = series.pnl.iter().copied().filter(|p| *p < 0.0).collect();

        let rmult = risk_multiples(trades, &series.pnl, &losses, params);
        let sqn = rmult.as_deref().and_then(|r| {
            let std = sample_std(r)?;
            (std > 0.0).then(|| mean(r).unwrap_or(0.0) / std * (n as f64).sqrt())
        });

        let daily = daily_pnl(&series.exit_times, &series.pnl);
        let cagr = cagr(&series.exit_times, &series.net_equity);
        let sharpe = sharpe(&series.exit_times, &series.net_equity, config.trading_days);
        let ulcer = ulcer_index(&series.net_equity);
        let score = match (cagr, sharpe, ulcer) {
            (Some(c), Some(s), Some(u)) => Some(c * s / (u + config.epsilon)),
            _ => None,
        };

        Stats {
            pnl: series.equity.last().copied().unwrap_or(0.0),
            net_pnl: series.net_pnl.iter().fold(0.0, |acc, p| acc + p),
            winrate: (n > 0).then(|| wins.len() as f64 / n as f64),
            total_trades: n,
            total_volume: trades.iter().map(|t| t.size).sum(),
            max_lossing_streak: max_losing_streak(&series.pnl),
            max_drawdown: series.drawdown.iter().copied().reduce(f64::max),
            max_used_bp: series.used_bp.iter().map(|(_, bp)| *bp).reduce(f64::max),
            sqn,
            std_profit: sample_std(&wins),
            std_loss: sample_std(&losses),
            avg_profit: mean(&wins),
            avg_loss: mean(&losses),
            avg_day_profit: mean(&daily),
            std_day_profit: sample_std(&daily),
            cagr,
            sharpe,
            ulcer,
            score,
        }
    }

    /// Values in [`STAT_COLUMNS`] order.
    pub fn values(&self) -> Vec<Option<f64>> {
        vec![
            Some(self.pnl),
            Some(self.net_pnl),
            self.winrate,
            Some(self.total_trades as f64),
            Some(self.total_volume as f64),
            Some(self.max_lossing_streak as f64),
            self.max_drawdown,
            self.max_used_bp,
            self.sqn,
            self.std_profit,
            self.std_loss,
            self.avg_profit,
            self.avg_loss,
            self.avg_day_profit,
            self.std_day_profit,
            self.cagr,
            self.sharpe,
            self.ulcer,
            self.score,
        ]
    }
}

/// PnL in units of risk. With an `sl_prc` parameter the risk is the stop
/// distance of each trade, otherwise the mean losing PnL (a negative unit).
fn risk_multiples(
    trades: &[Trade],
    pnl: &[f64],
    losses: &[f64],
    params: &ParameterSet,
) -> Option<Vec<f64>> {
    match params.get("sl_prc") {
        Some(sl_prc) => Some(
            trades
                .iter()
                .zip(pnl)
                .map(|(t, p)| p / (t.notional() * sl_prc))
                .collect(),
        ),
        None => {
            let unit = mean(losses)?;
            Some(pnl.iter().map(|p| p / unit).collect())
        }
    }
}

/// Gross PnL summed per calendar day of exit, zero-filled from the first to
/// the last exit day.
fn daily_pnl(exit_times: &[DateTime<FixedOffset>], pnl: &[f64]) -> Vec<f64> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (time, p) in exit_times.iter().zip(pnl) {
        *by_day.entry(time.date_naive()).or_insert(0.0) += p;
    }
    let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|d| by_day.get(&d).copied().unwrap_or(0.0))
        .collect()
}

/// Annualised growth of net equity between the first and last exit. Zero
/// when the growth ratio is non-positive, undefined over a zero-day span.
fn cagr(exit_times: &[DateTime<FixedOffset>], net_equity: &[f64]) -> Option<f64> {
    let (first, last) = (*net_equity.first()?, *net_equity.last()?);
    let growth = last / first;
    if growth.is_nan() || growth <= 0.0 {
        return Some(0.0);
    }
    let days = (*exit_times.last()? - *exit_times.first()?).num_days();
    if days <= 0 {
        return None;
    }
    let years = days as f64 / 365.0;
    Some(growth.powf(1.0 / years) - 1.0)
}

/// Annualised Sharpe ratio of day-over-day net equity changes. Only pairs
/// of adjacent calendar days that both have exits contribute a return.
fn sharpe(
    exit_times: &[DateTime<FixedOffset>],
    net_equity: &[f64],
    trading_days: f64,
) -> Option<f64> {
    let mut close_by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (time, e) in exit_times.iter().zip(net_equity) {
        close_by_day.insert(time.date_naive(), *e);
    }
    let returns: Vec<f64> = close_by_day
        .iter()
        .filter_map(|(day, e)| {
            let prev = close_by_day.get(&day.pred_opt()?)?;
            (*prev != 0.0).then(|| e / prev - 1.0)
        })
        .collect();
    let std = sample_std(&returns)?;
    if std == 0.0 {
        return None;
    }
    Some(mean(&returns)? / std * trading_days.sqrt())
}

/// Root mean square of percent drawdown of net equity from its running
/// maximum.
fn ulcer_index(net_equity: &[f64]) -> Option<f64> {
    if net_equity.is_empty() {
        return None;
    }
    let mut peak = f64::NEG_INFINITY;
    let mut sum_sq = 0.0;
    for &e in net_equity {
        peak = peak.max(e);
        if peak == 0.0 {
            return None;
        }
        let pct = (e / peak - 1.0) * 100.0;
        sum_sq += pct * pct;
    }
    Some((sum_sq / net_equity.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Tag, TagValue};
    use approx::assert_relative_eq;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn trade(size: i64, entry: f64, exit: f64, entry_time: &str, exit_time: &str) -> Trade {
        Trade {
            symbol: "PUMP".into(),
            size,
            entry_bar: 0,
            exit_bar: 1,
            entry_price: entry,
            exit_price: exit,
            stop_loss: None,
            take_profit: None,
            pnl: size as f64 * (exit - entry),
            entry_time: ts(entry_time),
            exit_time: ts(exit_time),
            tag: Tag::new(),
        }
    }

    /// One trade per day with the given PnLs (size 100, entry 10).
    fn daily_ledger(pnls: &[f64]) -> TradeLedger {
        let trades = pnls
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let day = i + 1;
                trade(
                    100,
                    10.0,
                    10.0 + p / 100.0,
                    &format!("2024-01-{day:02}T10:00:00Z"),
                    &format!("2024-01-{day:02}T15:00:00Z"),
                )
            })
            .collect();
        TradeLedger::new(trades)
    }

    #[test]
    fn equity_curve_is_running_sum() {
        assert_eq!(equity_curve(&[1.0, -2.0, 3.0]), vec![1.0, -1.0, 2.0]);
        assert!(equity_curve(&[]).is_empty());
    }

    #[test]
    fn drawdown_from_running_max() {
        let dd = drawdown(&[1.0, 3.0, 2.0, 0.0, 4.0]);
        assert_eq!(dd, vec![0.0, 0.0, 1.0, 3.0, 0.0]);
    }

    #[test]
    fn losing_streak_example() {
        let pnls = [1.0, -1.0, -1.0, 1.0, -1.0, -1.0, -1.0];
        assert_eq!(max_losing_streak(&pnls), 3);
        assert_eq!(max_losing_streak(&[1.0, 0.0, 2.0]), 0);
    }

    #[test]
    fn breakeven_breaks_a_streak() {
        assert_eq!(max_losing_streak(&[-1.0, 0.0, -1.0]), 1);
    }

    #[test]
    fn used_bp_overlapping_trades() {
        // A: 500 from t0 to t2, B: 300 from t1 to t3
        let a = trade(50, 10.0, 11.0, "2024-01-01T10:00:00Z", "2024-01-03T10:00:00Z");
        let b = trade(30, 10.0, 9.0, "2024-01-02T10:00:00Z", "2024-01-04T10:00:00Z");
        let bp: Vec<f64> = used_buying_power(&[a, b]).into_iter().map(|(_, v)| v).collect();
        assert_eq!(bp, vec![500.0, 800.0, 300.0, 0.0]);
    }

    #[test]
    fn used_bp_releases_before_reusing() {
        let a = trade(50, 10.0, 11.0, "2024-01-01T10:00:00Z", "2024-01-02T10:00:00Z");
        let b = trade(50, 10.0, 11.0, "2024-01-02T10:00:00Z", "2024-01-03T10:00:00Z");
        let max = used_buying_power(&[a, b])
            .into_iter()
            .map(|(_, v)| v)
            .fold(f64::MIN, f64::max);
        assert_eq!(max, 500.0);
    }

    #[test]
    fn winrate_ma_waits_for_window() {
        let ma = winrate_ma(&[1.0, -1.0, 1.0, 1.0], 2);
        assert_eq!(ma, vec![None, Some(0.5), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn cap_pnl_with_slack() {
        assert_eq!(cap_pnl(-400.0, 300.0, 2.0, 50.0), -300.0);
        assert_eq!(cap_pnl(-340.0, 300.0, 2.0, 50.0), -340.0);
        assert_eq!(cap_pnl(700.0, 300.0, 2.0, 0.0), 600.0);
        assert_eq!(cap_pnl(100.0, 300.0, 2.0, 0.0), 100.0);
    }

    #[test]
    fn stop_target_trim_reprices_exit() {
        let mut t = trade(100, 10.0, 8.5, "2024-01-01T10:00:00Z", "2024-01-02T10:00:00Z");
        t.stop_loss = Some(9.0);
        t.tag.insert("exit_reason".into(), TagValue::Text("sl".into()));
        let config = AnalyticsConfig {
            trim: TrimMode::StopTarget,
            ..AnalyticsConfig::default()
        };
        assert_relative_eq!(adjusted_pnl(&t, &ParameterSet::new(), &config), -100.0);
    }

    #[test]
    fn simple_trim_needs_stop_params() {
        let t = trade(100, 10.0, 1.0, "2024-01-01T10:00:00Z", "2024-01-02T10:00:00Z");
        let config = AnalyticsConfig {
            trim: TrimMode::Simple,
            ..AnalyticsConfig::default()
        };
        assert_eq!(adjusted_pnl(&t, &ParameterSet::new(), &config), t.pnl);
        let params = ParameterSet::from_pairs([("sl_prc", 0.3), ("reward", 2.0)]).unwrap();
        assert_relative_eq!(adjusted_pnl(&t, &params, &config), -300.0);
    }

    #[test]
    fn trim_mode_parsing() {
        assert_eq!("sl/tp".parse::<TrimMode>().unwrap(), TrimMode::StopTarget);
        assert_eq!("sltp".parse::<TrimMode>().unwrap(), TrimMode::StopTarget);
        assert_eq!("".parse::<TrimMode>().unwrap(), TrimMode::None);
        assert!("cap".parse::<TrimMode>().is_err());
    }

    #[test]
    fn stats_basic_counts() {
        let ledger = daily_ledger(&[100.0, -50.0, 200.0, -30.0]);
        let stats = Stats::compute(&ledger, &ParameterSet::new(), &AnalyticsConfig::default());
        assert_relative_eq!(stats.pnl, 220.0, epsilon = 1e-9);
        assert_relative_eq!(stats.net_pnl, 220.0 - 4.0 * 100.0 * 0.014, epsilon = 1e-9);
        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.total_volume, 400);
        assert_relative_eq!(stats.winrate.unwrap(), 0.5);
        assert_relative_eq!(stats.avg_profit.unwrap(), 150.0, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_loss.unwrap(), -40.0, epsilon = 1e-9);
        assert_relative_eq!(stats.max_drawdown.unwrap(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(stats.max_used_bp.unwrap(), 1000.0, epsilon = 1e-9);
        assert_eq!(stats.max_lossing_streak, 1);
    }

    #[test]
    fn rmult_from_stop_percent() {
        let ledger = daily_ledger(&[300.0, -300.0, 600.0]);
        let params = ParameterSet::from_pairs([("sl_prc", 0.3)]).unwrap();
        let stats = Stats::compute(&ledger, &params, &AnalyticsConfig::default());
        // rmult = [1, -1, 2]
        let expected = 2.0_f64 / 3.0 / (7.0_f64 / 3.0).sqrt() * 3.0_f64.sqrt();
        assert_relative_eq!(stats.sqn.unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn rmult_from_mean_loss() {
        let ledger = daily_ledger(&[100.0, -50.0, 200.0, -150.0]);
        let stats = Stats::compute(&ledger, &ParameterSet::new(), &AnalyticsConfig::default());
        // unit = -100: rmult = [-1, 0.5, -2, 1.5]
        let r: [f64; 4] = [-1.0, 0.5, -2.0, 1.5];
        let m = r.iter().sum::<f64>() / 4.0;
        let sd = (r.iter().map(|x| (x - m).powi(2)).sum::<f64>() / 3.0).sqrt();
        assert_relative_eq!(stats.sqn.unwrap(), m / sd * 2.0, epsilon = 1e-9);
        assert!(stats.sqn.unwrap() < 0.0);
    }

    #[test]
    fn no_losses_leaves_loss_stats_undefined() {
        let ledger = daily_ledger(&[100.0, 50.0]);
        let stats = Stats::compute(&ledger, &ParameterSet::new(), &AnalyticsConfig::default());
        assert_eq!(stats.avg_loss, None);
        assert_eq!(stats.std_loss, None);
        // no stop percentage and no losses: no risk unit
        assert_eq!(stats.sqn, None);
        assert!(stats.avg_profit.is_some());
    }

    #[test]
    fn single_trade_has_undefined_spread() {
        let ledger = daily_ledger(&[100.0]);
        let stats = Stats::compute(&ledger, &ParameterSet::new(), &AnalyticsConfig::default());
        assert_eq!(stats.std_profit, None);
        assert_eq!(stats.std_day_profit, None);
        assert_eq!(stats.cagr, None);
        assert_eq!(stats.sharpe, None);
        assert_eq!(stats.score, None);
        assert_relative_eq!(stats.winrate.unwrap(), 1.0);
    }

    #[test]
    fn empty_ledger_is_mostly_undefined() {
        let stats = Stats::compute(
            &TradeLedger::default(),
            &ParameterSet::new(),
            &AnalyticsConfig::default(),
        );
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.pnl, 0.0);
        // rendered as "0", never "-0"
        assert!(stats.net_pnl.is_sign_positive());
        assert_eq!(stats.net_pnl.to_string(), "0");
        assert_eq!(stats.winrate, None);
        assert_eq!(stats.max_drawdown, None);
        assert_eq!(stats.ulcer, None);
        assert_eq!(stats.values().len(), STAT_COLUMNS.len());
    }

    #[test]
    fn day_profit_fills_empty_days() {
        let trades = vec![
            trade(100, 10.0, 11.0, "2024-01-01T10:00:00Z", "2024-01-01T15:00:00Z"),
            trade(100, 10.0, 10.5, "2024-01-03T10:00:00Z", "2024-01-03T15:00:00Z"),
        ];
        let stats = Stats::compute(
            &TradeLedger::new(trades),
            &ParameterSet::new(),
            &AnalyticsConfig::default(),
        );
        // daily: [100, 0, 50]
        assert_relative_eq!(stats.avg_day_profit.unwrap(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(stats.std_day_profit.unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn cagr_is_zero_for_non_positive_growth() {
        let trades = vec![
            trade(100, 10.0, 11.0, "2024-01-01T10:00:00Z", "2024-01-01T15:00:00Z"),
            trade(2000, 10.0, 0.0, "2024-06-01T10:00:00Z", "2024-06-01T15:00:00Z"),
        ];
        let stats = Stats::compute(
            &TradeLedger::new(trades),
            &ParameterSet::new(),
            &AnalyticsConfig::default(),
        );
        assert_eq!(stats.cagr, Some(0.0));
    }

    #[test]
    fn cagr_annualises_growth() {
        let exits = [ts("2024-01-01T00:00:00Z"), ts("2024-12-31T00:00:00Z")];
        // 365 days
        let c = cagr(&exits, &[10_000.0, 11_000.0]).unwrap();
        assert_relative_eq!(c, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn sharpe_uses_adjacent_days_only() {
        let exits = [
            ts("2024-01-01T15:00:00Z"),
            ts("2024-01-02T15:00:00Z"),
            ts("2024-01-03T15:00:00Z"),
            ts("2024-01-10T15:00:00Z"),
        ];
        let equity = [100.0, 110.0, 99.0, 500.0];
        let s = sharpe(&exits, &equity, 252.0).unwrap();
        let r: [f64; 2] = [0.1, 99.0 / 110.0 - 1.0];
        let m = (r[0] + r[1]) / 2.0;
        let sd = ((r[0] - m).powi(2) + (r[1] - m).powi(2)).sqrt();
        assert_relative_eq!(s, m / sd * 252.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn ulcer_of_flat_curve_is_zero() {
        assert_eq!(ulcer_index(&[100.0, 100.0]), Some(0.0));
        let u = ulcer_index(&[100.0, 90.0]).unwrap();
        assert_relative_eq!(u, (100.0_f64 / 2.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn score_combines_ratios() {
        let ledger = daily_ledger(&[100.0, -50.0, 200.0, -30.0, 80.0]);
        let config = AnalyticsConfig::default();
        let stats = Stats::compute(&ledger, &ParameterSet::new(), &config);
        let expected =
            stats.cagr.unwrap() * stats.sharpe.unwrap() / (stats.ulcer.unwrap() + config.epsilon);
        assert_relative_eq!(stats.score.unwrap(), expected);
    }

    #[test]
    fn trade_series_equity_ends_at_total_pnl() {
        let ledger = daily_ledger(&[100.0, -50.0, 25.0]);
        let series = TradeSeries::compute(&ledger, &ParameterSet::new(), &AnalyticsConfig::default());
        assert_relative_eq!(*series.equity.last().unwrap(), 75.0, epsilon = 1e-9);
        assert_relative_eq!(
            *series.net_equity.last().unwrap(),
            10_000.0 + 75.0 - 3.0 * 1.4,
            epsilon = 1e-9
        );
        assert_eq!(series.drawdown.len(), 3);
    }
}
