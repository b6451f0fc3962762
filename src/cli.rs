//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::run_grid;
use crate::domain::config_validation::{AppConfig, load_config};
use crate::domain::error::MomotraderError;
use crate::domain::filter::{FilterGrid, apply_filter_grid};
use crate::domain::metrics::{AnalyticsConfig, Stats};
use crate::domain::universe::{load_universe, parse_symbols};
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::{LedgerPort, ReportRow};

#[derive(Parser, Debug)]
#[command(name = "momotrader", about = "Momentum-pump strategy backtester")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the parameter grid and write one ledger per parameter set
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, overriding [data] symbols
        #[arg(long)]
        symbols: Option<String>,
        /// Validate and resolve inputs without simulating
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-filter stored ledgers by the [filter] predicate grid
    Filter {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for filtered ledgers (default: <ledger_dir>/filtered)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute statistics over a directory of ledgers and write the report
    Stats {
        #[arg(short, long)]
        config: PathBuf,
        /// Ledger directory, overriding [output] ledger_dir
        #[arg(long)]
        ledgers: Option<PathBuf>,
        /// Report path, overriding [output] report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbols,
            dry_run,
        } => run_backtest(&config, symbols.as_deref(), dry_run),
        Command::Filter { config, output } => run_filter(&config, output.as_deref()),
        Command::Stats {
            config,
            ledgers,
            output,
        } => run_stats(&config, ledgers.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Read and validate the configuration file at `path`.
pub fn load_app_config(path: &Path) -> Result<AppConfig, MomotraderError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    load_config(&adapter)
}

/// Symbols from the command line, then `[data] symbols`, then every series
/// the data port knows about.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    app: &AppConfig,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, MomotraderError> {
    let symbols = match (symbols_override, &app.data.symbols) {
        (Some(raw), _) => parse_symbols(raw)?,
        (None, Some(configured)) => configured.clone(),
        (None, None) => data_port.list_symbols()?,
    };
    if symbols.is_empty() {
        return Err(MomotraderError::NoData {
            symbol: app.data.bars_dir.display().to_string(),
        });
    }
    Ok(symbols)
}

fn data_adapter(app: &AppConfig) -> CsvAdapter {
    CsvAdapter::new(
        app.data.bars_dir.clone(),
        app.data.timeframe,
        app.data.utc_offset,
    )
}

fn run_backtest(
    config_path: &Path,
    symbols_override: Option<&str>,
    dry_run: bool,
) -> Result<(), MomotraderError> {
    let app = load_app_config(config_path)?;
    let data_port = data_adapter(&app);
    let symbols = resolve_symbols(symbols_override, &app, &data_port)?;

    if dry_run {
        eprintln!("Variant:        {}", app.run.variant);
        eprintln!("Fill policy:    {}", app.run.fill_policy);
        eprintln!("Parameter sets: {}", app.grid.size());
        eprintln!("Symbols:        {}", symbols.join(", "));
        return Ok(());
    }

    let ledger_port = CsvLedgerAdapter::new(app.output.ledger_dir.clone());
    let summary = run_backtest_pipeline(&data_port, &ledger_port, &app, &symbols)?;
    eprintln!(
        "Wrote {} ledgers ({} trades) to {}",
        summary.ledgers,
        summary.trades,
        app.output.ledger_dir.display()
    );
    if summary.failed_symbols > 0 {
        eprintln!("{} symbol runs failed; see log", summary.failed_symbols);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktestSummary {
    pub ledgers: usize,
    pub trades: usize,
    /// Symbols that failed to load plus failed (symbol, parameter set) runs.
    pub failed_symbols: usize,
}

/// Load the universe, run the grid and persist every ledger.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    ledger_port: &dyn LedgerPort,
    app: &AppConfig,
    symbols: &[String],
) -> Result<BacktestSummary, MomotraderError> {
    let universe = load_universe(data_port, symbols, app.data.timeframe, app.run.min_bars)?;
    let sets = app.parameter_sets()?;
    let runs = run_grid(&universe.series, &sets, &app.run)?;

    let mut summary = BacktestSummary {
        ledgers: 0,
        trades: 0,
        failed_symbols: universe.failures.len(),
    };
    for grid_run in &runs {
        ledger_port.write_ledger(&grid_run.params, &grid_run.ledger)?;
        debug!(
            params = %grid_run.params,
            symbols = ?grid_run.ledger.symbols(),
            "ledger written"
        );
        summary.ledgers += 1;
        summary.trades += grid_run.ledger.len();
        summary.failed_symbols += grid_run.failures.len();
    }
    Ok(summary)
}

fn run_filter(config_path: &Path, output: Option<&Path>) -> Result<(), MomotraderError> {
    let app = load_app_config(config_path)?;
    let input = CsvLedgerAdapter::new(app.output.ledger_dir.clone());
    let output_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| app.output.ledger_dir.join("filtered"));
    let output_port = CsvLedgerAdapter::new(output_dir.clone());

    let written = run_filter_pipeline(&input, &output_port, &app.filter)?;
    eprintln!("Wrote {written} filtered ledgers to {}", output_dir.display());
    Ok(())
}

/// Apply the filter grid to every stored ledger. Returns the number of
/// filtered ledgers written.
pub fn run_filter_pipeline(
    input: &dyn LedgerPort,
    output: &dyn LedgerPort,
    filter: &FilterGrid,
) -> Result<usize, MomotraderError> {
    if filter.is_empty() {
        return Err(MomotraderError::ConfigMissing {
            section: "filter".to_string(),
            key: "<any tag key>".to_string(),
        });
    }

    let mut written = 0;
    for params in input.list_ledgers()? {
        let ledger = input.read_ledger(&params)?;
        for filtered in apply_filter_grid(&ledger, filter, &params)? {
            info!(
                params = %filtered.params,
                kept = filtered.ledger.len(),
                of = ledger.len(),
                "filtered ledger"
            );
            output.write_ledger(&filtered.params, &filtered.ledger)?;
            written += 1;
        }
    }
    Ok(written)
}

fn run_stats(
    config_path: &Path,
    ledgers: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), MomotraderError> {
    let app = load_app_config(config_path)?;
    let ledger_dir = ledgers
        .map(Path::to_path_buf)
        .unwrap_or_else(|| app.output.ledger_dir.clone());
    let report = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| app.output.report.clone());

    let port = CsvLedgerAdapter::new(ledger_dir);
    let rows = run_stats_pipeline(&port, &app.analytics, &report)?;
    eprintln!("Wrote {} report rows to {}", rows.len(), report.display());
    let best = rows
        .iter()
        .filter_map(|r| r.stats.score.map(|score| (score, &r.params)))
        .max_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((score, params)) = best {
        eprintln!("Best score: {score:.4} ({params})");
    }
    Ok(())
}

/// Compute statistics for every stored ledger and write the report.
pub fn run_stats_pipeline(
    ledger_port: &dyn LedgerPort,
    analytics: &AnalyticsConfig,
    report: &Path,
) -> Result<Vec<ReportRow>, MomotraderError> {
    let mut ledgers = Vec::new();
    for params in ledger_port.list_ledgers()? {
        let ledger = ledger_port.read_ledger(&params)?;
        ledgers.push((params, ledger));
    }
    if ledgers.is_empty() {
        warn!("no ledgers found");
    }

    let rows: Vec<ReportRow> = ledgers
        .into_par_iter()
        .map(|(params, ledger)| ReportRow {
            stats: Stats::compute(&ledger, &params, analytics),
            params,
        })
        .collect();

    let report_path = report.to_str().ok_or_else(|| MomotraderError::ConfigInvalid {
        section: "output".to_string(),
        key: "report".to_string(),
        reason: format!("{} is not valid UTF-8", report.display()),
    })?;
    ledger_port.write_report(&rows, report_path)?;
    Ok(rows)
}

fn run_validate(config_path: &Path) -> Result<(), MomotraderError> {
    let app = load_app_config(config_path)?;
    eprintln!("Config validated successfully");
    eprintln!("  variant:        {}", app.run.variant);
    eprintln!("  timeframe:      {}", app.data.timeframe);
    eprintln!("  parameter sets: {}", app.grid.size());
    let keys: Vec<&str> = app.filter.keys().collect();
    if !keys.is_empty() {
        eprintln!(
            "  filter:         {} combinations over {}",
            app.filter.combinations().len(),
            keys.join(", ")
        );
    }
    Ok(())
}
