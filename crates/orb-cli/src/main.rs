//! Thin CLI wrapper around the backtest core (§6.3). Not core logic: this
//! binary only loads config, loads bars, drives `orb_backtest::Orchestrator`
//! once per instrument, and persists what comes back via `orb-audit`.
//! Grounded in `mqk-cli`'s clap-derive `Cli`/`Commands` shape, stripped of
//! the database/broker subcommands that don't apply to a backtest-only
//! core.

mod data;
mod report;

use std::path::Path;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use orb_backtest::Orchestrator;
use orb_governance::GovernanceEngine;
use orb_types::{ConfigError, DataError};

#[derive(Parser)]
#[command(name = "orb")]
#[command(about = "Opening-range-breakout backtest core", long_about = None)]
struct Cli {
    /// Repeatable; -v info, -vv debug, -vvv trace. Default: info.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over one or more instruments and write the ledger,
    /// equity series, and session summary to `--output-dir`.
    Run(RunArgs),

    /// Compute the layered config hash and print the canonical JSON,
    /// without running anything (§6.4, §8 Scenario F).
    ConfigHash {
        /// Paths in merge order (base -> overrides, later wins).
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Layered run-config YAML files, base first, overrides last.
    #[arg(long = "config", required = true)]
    config_paths: Vec<String>,

    /// Directory holding one `<instrument_config_dir>/<symbol>.yaml` per
    /// traded symbol, optionally layered over `_default.yaml`.
    #[arg(long)]
    instrument_config_dir: String,

    /// Comma-separated symbols; overrides the config file's instrument
    /// list when given.
    #[arg(long)]
    instruments: Option<String>,

    /// Overrides the config file's start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Overrides the config file's end date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Directory holding one `<symbol>.csv` bar file per instrument.
    #[arg(long)]
    data_dir: Option<String>,

    /// Output directory; a `<run-id>/` subdirectory is created under it.
    #[arg(long)]
    output_dir: Option<String>,

    /// Append a tamper-evident hash chain to the trade ledger.
    #[arg(long)]
    hash_chain: bool,
}

/// Top-level CLI error, carrying enough to pick the §7 exit code.
enum AppError {
    Config(ConfigError),
    Data(DataError),
    Internal(anyhow::Error),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<DataError> for AppError {
    fn from(e: DataError) -> Self {
        AppError::Data(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.cmd {
        Commands::Run(args) => run(args),
        Commands::ConfigHash { paths } => config_hash(paths),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(AppError::Config(e)) => {
            tracing::error!(%e, "configuration error");
            ExitCode::from(1)
        }
        Err(AppError::Data(e)) => {
            tracing::error!(%e, "data error");
            ExitCode::from(2)
        }
        Err(AppError::Internal(e)) => {
            eprintln!("internal error: {e:?}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_hash(paths: Vec<String>) -> Result<(), AppError> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = orb_config::load_layered_yaml(&path_refs)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

fn run(args: RunArgs) -> Result<(), AppError> {
    let path_refs: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let (mut run_config, loaded) = orb_config::load_run_config(&path_refs)?;

    if let Some(instruments) = &args.instruments {
        run_config.instruments = instruments.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(start) = args.start {
        run_config.start_date = start;
    }
    if let Some(end) = args.end {
        run_config.end_date = end;
    }
    if let Some(data_dir) = &args.data_dir {
        run_config.data_dir = data_dir.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        run_config.output_dir = output_dir.clone();
    }
    run_config
        .rules
        .validate()
        .map_err(ConfigError::Invalid)?;

    let instrument_config_dir = args.instrument_config_dir.clone();
    let instruments_ref: Vec<&str> = run_config.instruments.iter().map(String::as_str).collect();
    let instrument_configs = orb_config::load_instrument_configs(&instruments_ref, |symbol| {
        let default_layer = format!("{instrument_config_dir}/_default.yaml");
        let symbol_layer = format!("{instrument_config_dir}/{symbol}.yaml");
        if Path::new(&default_layer).exists() {
            vec![default_layer, symbol_layer]
        } else {
            vec![symbol_layer]
        }
    })?;

    let run_dir = format!("{}/{}", run_config.output_dir, run_config.run_id);
    let mut ledger = orb_audit::LedgerWriter::new(
        format!("{run_dir}/trades"),
        run_config.run_id,
        args.hash_chain,
    )
    .map_err(AppError::Internal)?;
    let mut equity = orb_audit::EquityWriter::new(format!("{run_dir}/equity")).map_err(AppError::Internal)?;

    let mut all_records = Vec::new();
    for symbol in &run_config.instruments {
        let instrument = instrument_configs
            .get(symbol)
            .ok_or_else(|| ConfigError::Invalid(format!("no instrument config loaded for {symbol}")))?
            .clone();

        let bars = data::load_instrument_bars(
            &run_config.data_dir,
            symbol,
            run_config.start_date,
            run_config.end_date,
        )?;

        let governance = GovernanceEngine::new(
            run_config.rules.clone(),
            run_config.rules.max_daily_trades_per_instrument,
            run_config.rules.account_size,
        );
        let mut orchestrator = Orchestrator::new(instrument, run_config.clone(), governance, None, None);
        let records = orchestrator
            .run(&bars)
            .map_err(|e| anyhow::anyhow!("{symbol}: {e}"))?;

        tracing::info!(instrument = %symbol, trades = records.len(), "backtest complete");
        all_records.extend(records);
    }

    all_records.sort_by_key(|r| r.trade.exit_timestamp);

    for sample in report::build_equity_samples(&all_records, 0) {
        equity.append(&sample).map_err(AppError::Internal)?;
    }
    for record in &all_records {
        ledger.append(record.trade.clone()).map_err(AppError::Internal)?;
    }

    let summary = report::build_summary(run_config.run_id, loaded.config_hash.clone(), &all_records);
    orb_audit::write_session_summary(format!("{run_dir}/summary"), &summary).map_err(AppError::Internal)?;
    std::fs::write(format!("{run_dir}/config"), &loaded.canonical_json).map_err(|e| anyhow::anyhow!(e))?;

    println!("run_id={}", run_config.run_id);
    println!("config_hash={}", loaded.config_hash);
    println!("total_trades={}", summary.total_trades);
    println!("total_r={:.4}", summary.total_r);
    println!("final_balance={:.2}", summary.final_balance);
    Ok(())
}
