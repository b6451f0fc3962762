//! Configuration loading and validation.
//!
//! Reads every section through [`ConfigPort`] into typed settings and
//! rejects unknown keys, malformed values and conflicting combinations
//! before any simulation starts.

use crate::domain::backtest::{ParamGrid, RunConfig};
use crate::domain::error::MomotraderError;
use crate::domain::filter::FilterGrid;
use crate::domain::metrics::{AnalyticsConfig, TrimMode};
use crate::domain::ohlcv::Timeframe;
use crate::domain::params::ParameterSet;
use crate::domain::strategy::{FillPolicy, Variant};
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::FixedOffset;
use std::path::PathBuf;
use std::str::FromStr;

const DATA_KEYS: &[&str] = &["bars_dir", "timeframe", "utc_offset", "symbols", "min_bars"];
const RUN_KEYS: &[&str] = &[
    "variant",
    "fill_policy",
    "notional_unit",
    "commission_per_share",
    "volume_window",
    "intraday_volume_window",
    "signal_hour",
    "time_stop_days",
    "winrate_window",
    "trading_days",
    "starting_equity",
    "trim_pnl",
    "trim_slack",
];
const OUTPUT_KEYS: &[&str] = &["ledger_dir", "report"];

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub bars_dir: PathBuf,
    pub timeframe: Timeframe,
    /// Offset applied to timestamps that carry none.
    pub utc_offset: FixedOffset,
    /// `None` means every series found in `bars_dir`.
    pub symbols: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub ledger_dir: PathBuf,
    pub report: PathBuf,
}

/// Fully validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data: DataSettings,
    pub run: RunConfig,
    pub analytics: AnalyticsConfig,
    pub grid: ParamGrid,
    pub filter: FilterGrid,
    pub output: OutputSettings,
}

impl AppConfig {
    /// Parameter sets of the grid, each already checked against the variant.
    pub fn parameter_sets(&self) -> Result<Vec<ParameterSet>, MomotraderError> {
        self.grid.parameter_sets()
    }
}

pub fn load_config(config: &dyn ConfigPort) -> Result<AppConfig, MomotraderError> {
    reject_unknown_keys(config, "data", DATA_KEYS)?;
    reject_unknown_keys(config, "run", RUN_KEYS)?;
    reject_unknown_keys(config, "output", OUTPUT_KEYS)?;

    let run = load_run_config(config)?;
    reject_unknown_keys(config, "params", run.variant.param_keys())?;
    reject_unknown_keys(config, "grid", run.variant.param_keys())?;
    reject_unknown_keys(config, "filter", &run.variant.tag_keys())?;

    let data = load_data_settings(config, run.variant)?;
    let analytics = load_analytics_config(config, &run)?;
    let grid = load_grid(config, run.variant)?;
    let filter = load_filter_grid(config, run.variant)?;

    // every combination must resolve to a simulable strategy
    for set in grid.parameter_sets()? {
        run.strategy_for(&set)?;
    }

    Ok(AppConfig {
        data,
        run,
        analytics,
        grid,
        filter,
        output: OutputSettings {
            ledger_dir: PathBuf::from(string_or(config, "output", "ledger_dir", "ledgers")),
            report: PathBuf::from(string_or(config, "output", "report", "report.csv")),
        },
    })
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, MomotraderError> {
    let variant = match config.get_string("run", "variant") {
        Some(name) => name
            .parse::<Variant>()
            .map_err(|reason| MomotraderError::invalid("run", "variant", reason))?,
        None => {
            return Err(MomotraderError::ConfigMissing {
                section: "run".to_string(),
                key: "variant".to_string(),
            });
        }
    };
    let defaults = RunConfig::for_variant(variant);

    let fill_policy: FillPolicy = parse_or(config, "run", "fill_policy", defaults.fill_policy)?;
    if fill_policy != variant.fill_policy() {
        return Err(MomotraderError::ConfigConflict {
            reason: format!(
                "fill_policy {fill_policy} conflicts with variant {variant}, which fills on {}",
                variant.fill_policy()
            ),
        });
    }

    let run = RunConfig {
        variant,
        fill_policy,
        notional_unit: parse_or(config, "run", "notional_unit", defaults.notional_unit)?,
        volume_window: parse_or(config, "run", "volume_window", defaults.volume_window)?,
        intraday_volume_window: parse_or(
            config,
            "run",
            "intraday_volume_window",
            defaults.intraday_volume_window,
        )?,
        signal_hour: parse_or(config, "run", "signal_hour", defaults.signal_hour)?,
        time_stop_days: parse_or(config, "run", "time_stop_days", defaults.time_stop_days)?,
        min_bars: parse_or(config, "data", "min_bars", defaults.min_bars)?,
    };
    run.validate()?;
    Ok(run)
}

pub fn load_analytics_config(
    config: &dyn ConfigPort,
    run: &RunConfig,
) -> Result<AnalyticsConfig, MomotraderError> {
    let defaults = AnalyticsConfig::default();
    let analytics = AnalyticsConfig {
        commission_per_share: parse_or(
            config,
            "run",
            "commission_per_share",
            defaults.commission_per_share,
        )?,
        notional_unit: run.notional_unit,
        winrate_window: parse_or(config, "run", "winrate_window", defaults.winrate_window)?,
        trading_days: parse_or(config, "run", "trading_days", defaults.trading_days)?,
        starting_equity: parse_or(config, "run", "starting_equity", defaults.starting_equity)?,
        trim: parse_or::<TrimMode>(config, "run", "trim_pnl", defaults.trim)?,
        trim_slack: parse_or(config, "run", "trim_slack", defaults.trim_slack)?,
        epsilon: defaults.epsilon,
    };

    if analytics.commission_per_share < 0.0 {
        return Err(MomotraderError::invalid(
            "run",
            "commission_per_share",
            "must be non-negative",
        ));
    }
    if analytics.winrate_window == 0 {
        return Err(MomotraderError::invalid("run", "winrate_window", "must be at least 1"));
    }
    if analytics.trading_days <= 0.0 {
        return Err(MomotraderError::invalid("run", "trading_days", "must be positive"));
    }
    if analytics.starting_equity <= 0.0 {
        return Err(MomotraderError::invalid("run", "starting_equity", "must be positive"));
    }
    if analytics.trim_slack < 0.0 {
        return Err(MomotraderError::invalid("run", "trim_slack", "must be non-negative"));
    }
    Ok(analytics)
}

fn load_data_settings(
    config: &dyn ConfigPort,
    variant: Variant,
) -> Result<DataSettings, MomotraderError> {
    let timeframe: Timeframe = parse_or(config, "data", "timeframe", variant.timeframe())?;
    if timeframe != variant.timeframe() {
        return Err(MomotraderError::ConfigConflict {
            reason: format!(
                "data timeframe {timeframe} does not match variant {variant}, which needs {} bars",
                variant.timeframe()
            ),
        });
    }

    let utc_offset = match config.get_string("data", "utc_offset") {
        Some(raw) => raw.trim().parse::<FixedOffset>().map_err(|e| {
            MomotraderError::invalid("data", "utc_offset", format!("{raw:?}: {e}"))
        })?,
        None => FixedOffset::east_opt(0).ok_or_else(|| {
            MomotraderError::invalid("data", "utc_offset", "cannot build UTC offset")
        })?,
    };

    let symbols = match config.get_string("data", "symbols") {
        Some(raw) if !raw.trim().is_empty() => Some(parse_symbols(&raw)?),
        _ => None,
    };

    Ok(DataSettings {
        bars_dir: PathBuf::from(string_or(config, "data", "bars_dir", "data")),
        timeframe,
        utc_offset,
        symbols,
    })
}

/// Build the grid in the variant's key order. Keys without a `[grid]` list
/// take their single `[params]` value, or the variant default.
pub fn load_grid(config: &dyn ConfigPort, variant: Variant) -> Result<ParamGrid, MomotraderError> {
    let defaults = variant.default_params();
    let mut grid = ParamGrid::new();

    for key in variant.param_keys() {
        let values = match config.get_string("grid", key) {
            Some(raw) => parse_value_list("grid", key, &raw)?,
            None => match config.get_string("params", key) {
                Some(raw) => vec![parse_value("params", key, &raw)?],
                None => match defaults.get(key) {
                    Some(value) => vec![value],
                    None => continue,
                },
            },
        };
        grid.push(*key, values)?;
    }
    Ok(grid)
}

/// Build the filter grid in the variant's tag key order.
pub fn load_filter_grid(
    config: &dyn ConfigPort,
    variant: Variant,
) -> Result<FilterGrid, MomotraderError> {
    let mut grid = FilterGrid::new();
    let keys = variant.tag_keys();
    for key in &keys {
        if let Some(raw) = config.get_string("filter", key) {
            grid.push_exprs(key, &raw)?;
        }
    }
    grid.validate(&keys)?;
    Ok(grid)
}

fn reject_unknown_keys(
    config: &dyn ConfigPort,
    section: &str,
    known: &[&str],
) -> Result<(), MomotraderError> {
    match config
        .section_keys(section)
        .into_iter()
        .find(|k| !known.contains(&k.as_str()))
    {
        Some(key) => Err(MomotraderError::UnknownParameter {
            key: format!("[{section}] {key}"),
        }),
        None => Ok(()),
    }
}

fn string_or(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse `[section] key` when present. Malformed values are errors rather
/// than silently falling back to the default.
fn parse_or<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, MomotraderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| MomotraderError::invalid(section, key, format!("{raw:?}: {e}"))),
        _ => Ok(default),
    }
}

fn parse_value(section: &str, key: &str, raw: &str) -> Result<f64, MomotraderError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| MomotraderError::invalid(section, key, format!("{raw:?} is not a number")))?;
    if !value.is_finite() {
        return Err(MomotraderError::invalid(section, key, "must be finite"));
    }
    Ok(value)
}

fn parse_value_list(section: &str, key: &str, raw: &str) -> Result<Vec<f64>, MomotraderError> {
    raw.split(',')
        .map(|token| parse_value(section, key, token))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig {
        values: HashMap<(String, String), String>,
    }

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig {
                values: entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            }
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }

        fn section_keys(&self, section: &str) -> Vec<String> {
            let mut keys: Vec<String> = self
                .values
                .keys()
                .filter(|(s, _)| s == section)
                .map(|(_, k)| k.clone())
                .collect();
            keys.sort();
            keys
        }
    }

    #[test]
    fn defaults_follow_variant() {
        let config = MapConfig::new(&[("run", "variant", "oc")]);
        let app = load_config(&config).unwrap();
        assert_eq!(app.run.fill_policy, FillPolicy::TradeOnOpen);
        assert_eq!(app.data.timeframe, Timeframe::Daily);
        assert_eq!(app.grid.size(), 1);
        let keys: Vec<&str> = app.grid.keys().collect();
        assert_eq!(keys, ["day_net_change", "rvol", "pullback"]);
        assert_eq!(app.output.report, PathBuf::from("report.csv"));
    }

    #[test]
    fn missing_variant_is_reported() {
        let config = MapConfig::new(&[]);
        let err = load_config(&config).unwrap_err();
        assert!(matches!(err, MomotraderError::ConfigMissing { key, .. } if key == "variant"));
    }

    #[test]
    fn grid_overrides_params_in_key_order() {
        let config = MapConfig::new(&[
            ("run", "variant", "ccprc"),
            ("grid", "reward", "2,3"),
            ("grid", "rvol", "3,5"),
            ("params", "sl_prc", "0.2"),
        ]);
        let app = load_config(&config).unwrap();
        let sets = app.parameter_sets().unwrap();
        assert_eq!(sets.len(), 4);
        assert_eq!(
            sets[1].to_string(),
            "day_net_change=0.3-rvol=3-pullback=0.5-sl_prc=0.2-reward=3"
        );
    }

    #[test]
    fn fill_policy_conflict_is_rejected() {
        let config = MapConfig::new(&[("run", "variant", "cc"), ("run", "fill_policy", "open")]);
        assert!(matches!(
            load_config(&config).unwrap_err(),
            MomotraderError::ConfigConflict { .. }
        ));
    }

    #[test]
    fn timeframe_conflict_is_rejected() {
        let config = MapConfig::new(&[("run", "variant", "hourly"), ("data", "timeframe", "daily")]);
        assert!(matches!(
            load_config(&config).unwrap_err(),
            MomotraderError::ConfigConflict { .. }
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let config = MapConfig::new(&[("run", "variant", "cc"), ("params", "sl_prc", "0.3")]);
        assert!(matches!(
            load_config(&config).unwrap_err(),
            MomotraderError::UnknownParameter { .. }
        ));

        let config = MapConfig::new(&[("run", "variant", "cc"), ("filter", "volume", ">=3")]);
        assert!(matches!(
            load_config(&config).unwrap_err(),
            MomotraderError::UnknownParameter { .. }
        ));

        let config = MapConfig::new(&[("run", "variant", "cc"), ("run", "capital", "5")]);
        assert!(load_config(&config).is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        let config = MapConfig::new(&[("run", "variant", "cc"), ("run", "volume_window", "abc")]);
        assert!(matches!(
            load_config(&config).unwrap_err(),
            MomotraderError::ConfigInvalid { .. }
        ));

        let config = MapConfig::new(&[("run", "variant", "cc"), ("grid", "rvol", "3,,5")]);
        assert!(load_config(&config).is_err());

        let config = MapConfig::new(&[("run", "variant", "fibo"), ("grid", "fibo", "0,7")]);
        assert!(load_config(&config).is_err());
    }

    #[test]
    fn filter_and_data_sections() {
        let config = MapConfig::new(&[
            ("run", "variant", "hourly"),
            ("filter", "rvol", ">=3,>=5"),
            ("data", "symbols", "RGTI, QUBT"),
            ("data", "utc_offset", "-05:00"),
            ("data", "min_bars", "30"),
            ("run", "trim_pnl", "sltp"),
        ]);
        let app = load_config(&config).unwrap();
        assert_eq!(app.filter.combinations().len(), 2);
        assert_eq!(
            app.data.symbols,
            Some(vec!["RGTI".to_string(), "QUBT".to_string()])
        );
        assert_eq!(app.data.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(app.run.min_bars, 30);
        assert_eq!(app.analytics.trim, TrimMode::StopTarget);
    }
}
