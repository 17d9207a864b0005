//! Crypto hybrid engine - main entry point
//!
//! This binary provides four subcommands:
//! - backtest: Replay a CSV history through the hybrid selector
//! - walk-forward: Backtest over sliding windows
//! - analyze: Run one decision cycle on the latest window
//! - simulate: Drive the engine tick by tick against the execution simulator

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "crypto-hybrid")]
#[command(about = "Hybrid multi-strategy crypto trading engine with simulation and backtesting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a backtest over a CSV history
    Backtest {
        /// OHLCV CSV file (datetime,open,high,low,close,volume)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base asset, e.g. "BTC" (overrides config file)
        #[arg(long)]
        base: Option<String>,

        /// RNG seed (overrides config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Backtest over overlapping sliding windows
    WalkForward {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bars per window
        #[arg(long)]
        window: Option<usize>,

        /// Bars between window starts
        #[arg(long)]
        step: Option<usize>,

        /// Run sequentially instead of parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Run one analysis cycle on the trailing window
    Analyze {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        base: Option<String>,
    },

    /// Replay candles through the engine in simulation mode
    Simulate {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        base: Option<String>,

        /// Sleep sampled latency before each simulated fill
        #[arg(long)]
        latency: bool,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);
    // built per-branch: the layer type depends on the subscriber stack it sits on
    macro_rules! file_layer {
        () => {
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false)
        };
    }

    if file_only {
        // keep the console clean for the progress bar
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer!())
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer!())
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::WalkForward { .. } => ("walk_forward", true),
        Commands::Analyze { .. } => ("analyze", false),
        Commands::Simulate { .. } => ("simulate", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            data,
            config,
            base,
            seed,
            json,
        } => commands::backtest::run(data, config, base, seed, json),

        Commands::WalkForward {
            data,
            config,
            window,
            step,
            sequential,
        } => commands::walk_forward::run(data, config, window, step, sequential),

        Commands::Analyze { data, config, base } => commands::analyze::run(data, config, base),

        Commands::Simulate {
            data,
            config,
            base,
            latency,
        } => commands::simulate::run(data, config, base, latency),
    }
}
