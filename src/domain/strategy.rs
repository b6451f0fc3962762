//! Strategy configuration: one pump-and-pullback core with enumerated
//! entry-timing, price-basis, stop and exit policies.
//!
//! The six historical variants are presets of [`StrategyConfig`].

use crate::domain::error::MomotraderError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::params::ParameterSet;
use std::fmt;
use std::str::FromStr;

/// Retracement ratios indexed by fib level.
pub const FIB_RATIOS: [f64; 6] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786];

/// Which bar price fills orders, fixed per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Fills use the signal bar's own close.
    TradeOnClose,
    /// Fills use the following bar's open.
    TradeOnOpen,
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" | "trade_on_close" => Ok(FillPolicy::TradeOnClose),
            "open" | "trade_on_open" => Ok(FillPolicy::TradeOnOpen),
            other => Err(format!("unknown fill policy {other:?} (expected close or open)")),
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillPolicy::TradeOnClose => write!(f, "close"),
            FillPolicy::TradeOnOpen => write!(f, "open"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTiming {
    /// Enter on the signal bar.
    Immediate,
    /// Enter at the close of the first bar at or after `hour` on the next
    /// trading day. The intent lapses once that day ends.
    Deferred { hour: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    SignalClose,
    NextOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRule {
    None,
    /// `sl = close * (1 - sl_prc)`, `tp = close * (1 + sl_prc * reward)`.
    Percent,
    /// `sl = low + FIB_RATIOS[level] * (high - low)`, percent target.
    Fibonacci { level: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    /// Exit at the close of the first bar after the fill.
    NextClose,
    /// Like `NextClose`, but the stop (checked against the low) and then the
    /// target (checked against the high) pre-empt the close.
    NextCloseWithStops,
    /// Hold until the stop or target trades, or a time stop fires.
    Bracket,
}

/// Strategy thresholds and sizing knobs that make up a run's parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub day_net_change: f64,
    pub rvol: f64,
    pub pullback: f64,
    pub sl_prc: f64,
    pub reward: f64,
    pub entry_hour: u32,
    pub fibo: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            day_net_change: 0.3,
            rvol: 5.0,
            pullback: 0.5,
            sl_prc: 0.3,
            reward: 2.0,
            entry_hour: 6,
            fibo: 0,
        }
    }
}

impl StrategyParams {
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "day_net_change" => Some(self.day_net_change),
            "rvol" => Some(self.rvol),
            "pullback" => Some(self.pullback),
            "sl_prc" => Some(self.sl_prc),
            "reward" => Some(self.reward),
            "entry_hour" => Some(self.entry_hour as f64),
            "fibo" => Some(self.fibo as f64),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: f64) -> Result<(), MomotraderError> {
        match key {
            "day_net_change" => self.day_net_change = value,
            "rvol" => self.rvol = value,
            "pullback" => self.pullback = value,
            "sl_prc" => self.sl_prc = value,
            "reward" => self.reward = value,
            "entry_hour" => self.entry_hour = whole(key, value, 23)? as u32,
            "fibo" => self.fibo = whole(key, value, FIB_RATIOS.len() - 1)?,
            _ => {
                return Err(MomotraderError::UnknownParameter {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn whole(key: &str, value: f64, max: usize) -> Result<usize, MomotraderError> {
    if value.fract() != 0.0 || value < 0.0 || value > max as f64 {
        return Err(MomotraderError::invalid(
            "params",
            key,
            format!("expected a whole number in 0..={max}, got {value}"),
        ));
    }
    Ok(value as usize)
}

/// The historical strategy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Hourly bars; signal at the session's last hour, deferred entry,
    /// bracket exit and a calendar time stop.
    Hourly,
    /// Enter on close, exit next close.
    DailyCc,
    /// Enter on close, exit next close unless stop/target trade first.
    DailyCcPrc,
    /// Enter next open, exit that bar's close.
    DailyOc,
    /// Enter next open, exit that bar's close unless stop/target trade first.
    DailyOcPrc,
    /// Enter on close with a fib-retracement stop, exit next close unless
    /// stop/target trade first.
    DailyFibo,
}

impl Variant {
    pub const ALL: [Variant; 6] = [
        Variant::Hourly,
        Variant::DailyCc,
        Variant::DailyCcPrc,
        Variant::DailyOc,
        Variant::DailyOcPrc,
        Variant::DailyFibo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Hourly => "hourly",
            Variant::DailyCc => "cc",
            Variant::DailyCcPrc => "ccprc",
            Variant::DailyOc => "oc",
            Variant::DailyOcPrc => "ocprc",
            Variant::DailyFibo => "fibo",
        }
    }

    /// Parameter keys in identifier order.
    pub fn param_keys(self) -> &'static [&'static str] {
        match self {
            Variant::Hourly => &[
                "day_net_change",
                "rvol",
                "pullback",
                "entry_hour",
                "sl_prc",
                "reward",
            ],
            Variant::DailyCc | Variant::DailyOc => &["day_net_change", "rvol", "pullback"],
            Variant::DailyCcPrc | Variant::DailyOcPrc => {
                &["day_net_change", "rvol", "pullback", "sl_prc", "reward"]
            }
            Variant::DailyFibo => &[
                "day_net_change",
                "rvol",
                "pullback",
                "sl_prc",
                "reward",
                "fibo",
            ],
        }
    }

    /// Keys a trade tag carries for this variant, besides the exit fields.
    pub fn tag_keys(self) -> Vec<&'static str> {
        let mut keys = self.param_keys().to_vec();
        for extra in ["sl", "tp"] {
            if self.stop_rule() != StopRule::None && !keys.contains(&extra) {
                keys.push(extra);
            }
        }
        keys
    }

    pub fn default_params(self) -> StrategyParams {
        match self {
            Variant::DailyFibo => StrategyParams {
                pullback: 0.6,
                rvol: 3.0,
                ..StrategyParams::default()
            },
            _ => StrategyParams::default(),
        }
    }

    pub fn timeframe(self) -> Timeframe {
        match self {
            Variant::Hourly => Timeframe::Hourly,
            _ => Timeframe::Daily,
        }
    }

    pub fn fill_policy(self) -> FillPolicy {
        match self {
            Variant::DailyOc | Variant::DailyOcPrc => FillPolicy::TradeOnOpen,
            _ => FillPolicy::TradeOnClose,
        }
    }

    fn price_basis(self) -> PriceBasis {
        match self.fill_policy() {
            FillPolicy::TradeOnOpen => PriceBasis::NextOpen,
            FillPolicy::TradeOnClose => PriceBasis::SignalClose,
        }
    }

    fn stop_rule(self) -> StopRule {
        match self {
            Variant::DailyCc | Variant::DailyOc => StopRule::None,
            Variant::DailyFibo => StopRule::Fibonacci { level: 0 },
            _ => StopRule::Percent,
        }
    }

    fn exit_rule(self) -> ExitRule {
        match self {
            Variant::Hourly => ExitRule::Bracket,
            Variant::DailyCc | Variant::DailyOc => ExitRule::NextClose,
            _ => ExitRule::NextCloseWithStops,
        }
    }

    /// Assemble the full configuration for one parameter set.
    pub fn build(self, params: StrategyParams, signal_hour: u32) -> StrategyConfig {
        let entry_timing = match self {
            Variant::Hourly if params.entry_hour != signal_hour => EntryTiming::Deferred {
                hour: params.entry_hour,
            },
            _ => EntryTiming::Immediate,
        };
        let stop_rule = match self.stop_rule() {
            StopRule::Fibonacci { .. } => StopRule::Fibonacci {
                level: params.fibo,
            },
            other => other,
        };
        StrategyConfig {
            variant: self,
            timeframe: self.timeframe(),
            fill_policy: self.fill_policy(),
            entry_timing,
            price_basis: self.price_basis(),
            stop_rule,
            exit_rule: self.exit_rule(),
            time_stop: self == Variant::Hourly,
            params,
        }
    }

    /// Overlay `set` onto this variant's defaults. Keys the variant does not
    /// declare are rejected.
    pub fn params_from_set(self, set: &ParameterSet) -> Result<StrategyParams, MomotraderError> {
        let mut params = self.default_params();
        for (key, value) in set.iter() {
            if !self.param_keys().contains(&key) {
                return Err(MomotraderError::UnknownParameter {
                    key: key.to_string(),
                });
            }
            params.set(key, value)?;
        }
        Ok(params)
    }

    /// The run identifier for `params`, in this variant's key order.
    pub fn parameter_set(self, params: &StrategyParams) -> Result<ParameterSet, MomotraderError> {
        let mut set = ParameterSet::new();
        for key in self.param_keys() {
            if let Some(value) = params.get(key) {
                set.insert(*key, value)?;
            }
        }
        Ok(set)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == lowered)
            .ok_or_else(|| {
                let names: Vec<_> = Variant::ALL.iter().map(|v| v.name()).collect();
                format!("unknown variant {s:?} (expected one of {})", names.join(", "))
            })
    }
}

/// Everything the signal generator and execution engine need to know about
/// a strategy for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub variant: Variant,
    pub timeframe: Timeframe,
    pub fill_policy: FillPolicy,
    pub entry_timing: EntryTiming,
    pub price_basis: PriceBasis,
    pub stop_rule: StopRule,
    pub exit_rule: ExitRule,
    pub time_stop: bool,
    pub params: StrategyParams,
}

impl StrategyConfig {
    /// Reject combinations the engine cannot simulate consistently.
    pub fn validate(&self) -> Result<(), MomotraderError> {
        match (self.price_basis, self.fill_policy) {
            (PriceBasis::NextOpen, FillPolicy::TradeOnClose) => {
                return Err(MomotraderError::ConfigConflict {
                    reason: format!(
                        "variant {} prices entries at the next open but fill_policy is close",
                        self.variant
                    ),
                });
            }
            (PriceBasis::SignalClose, FillPolicy::TradeOnOpen) => {
                return Err(MomotraderError::ConfigConflict {
                    reason: format!(
                        "variant {} prices entries at the signal close but fill_policy is open",
                        self.variant
                    ),
                });
            }
            _ => {}
        }

        if let EntryTiming::Deferred { hour } = self.entry_timing {
            if self.timeframe != Timeframe::Hourly {
                return Err(MomotraderError::ConfigConflict {
                    reason: format!("deferred entry at hour {hour} requires hourly bars"),
                });
            }
            if self.fill_policy != FillPolicy::TradeOnClose {
                return Err(MomotraderError::ConfigConflict {
                    reason: "deferred entry fills at a close and requires fill_policy close"
                        .into(),
                });
            }
        }

        if self.time_stop && self.timeframe != Timeframe::Hourly {
            return Err(MomotraderError::ConfigConflict {
                reason: "the calendar time stop only applies to hourly bars".into(),
            });
        }

        let p = &self.params;
        if p.rvol < 0.0 {
            return Err(MomotraderError::invalid("params", "rvol", "must be non-negative"));
        }
        if p.pullback <= 0.0 {
            return Err(MomotraderError::invalid("params", "pullback", "must be positive"));
        }
        if self.stop_rule != StopRule::None {
            if p.sl_prc <= 0.0 || p.sl_prc >= 1.0 {
                return Err(MomotraderError::invalid(
                    "params",
                    "sl_prc",
                    "must be between 0 and 1 (exclusive)",
                ));
            }
            if p.reward <= 0.0 {
                return Err(MomotraderError::invalid("params", "reward", "must be positive"));
            }
        }
        if let StopRule::Fibonacci { level } = self.stop_rule {
            if level >= FIB_RATIOS.len() {
                return Err(MomotraderError::invalid(
                    "params",
                    "fibo",
                    format!("level {level} is outside 0..={}", FIB_RATIOS.len() - 1),
                ));
            }
        }
        Ok(())
    }
}
