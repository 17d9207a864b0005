//! Backtest command implementation

use anyhow::{Context, Result};
use crypto_hybrid::backtest::Backtester;
use crypto_hybrid::data;
use crypto_hybrid::journal::TracingRecorder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{load_config, rule};

pub fn run(
    data_path: PathBuf,
    config_path: Option<PathBuf>,
    base_override: Option<String>,
    seed_override: Option<u64>,
    json: bool,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = load_config(config_path.as_deref(), base_override)?;
    if let Some(seed) = seed_override {
        info!("Overriding seed to: {}", seed);
        config.backtest.seed = seed;
    }

    let candles = data::load_csv(&data_path)?;
    let initial_balance = config.account.initial_balance;
    let quote = config.account.quote_asset.clone();
    let symbol = config.account.symbol();

    info!("Running backtest on {} candles for {}...", candles.len(), symbol);
    let result = Backtester::new(config)
        .with_recorder(Arc::new(TracingRecorder))
        .run(&candles);

    if json {
        let out = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{}", out);
        return Ok(());
    }

    let m = &result.metrics;
    println!("\n{}", rule());
    println!("BACKTEST RESULTS - {}", symbol);
    println!("{}", rule());
    println!("Initial Balance:    {:.2} {}", initial_balance, quote);
    println!("Final Balance:      {:.2} {}", m.final_balance, quote);
    println!("Total Return:       {:.2}%", m.total_return);
    println!("Sharpe Ratio:       {:.2}", m.sharpe_ratio);
    println!("Calmar Ratio:       {:.2}", m.calmar_ratio);
    println!("Max Drawdown:       {:.2}%", m.max_drawdown);
    println!("Win Rate:           {:.2}%", m.win_rate);
    println!("Profit Factor:      {:.2}", m.profit_factor);
    println!("Total Trades:       {}", m.total_trades);
    println!("Winning Trades:     {}", m.winning_trades);
    println!("Losing Trades:      {}", m.losing_trades);
    println!("Average Win:        {:.2}", m.avg_win);
    println!("Average Loss:       {:.2}", m.avg_loss);
    println!("Largest Win:        {:.2}", m.largest_win);
    println!("Largest Loss:       {:.2}", m.largest_loss);
    println!("Total Fees:         {:.2}", m.total_fees);
    println!("Avg Hold:           {:.1}h", m.avg_hold_secs / 3600.0);
    for (reason, count) in &m.exit_reasons {
        println!("  exit {:<14}  {}", reason.to_string(), count);
    }
    for (strategy, count) in &m.strategy_usage {
        println!("  {:<19} {} trades", strategy.to_string(), count);
    }
    if result.halted {
        println!("Risk halt active at end of replay");
    }
    println!("{}", rule());

    info!("Backtest completed successfully");
    Ok(())
}
