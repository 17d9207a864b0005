//! Analyze command implementation

use anyhow::Result;
use crypto_hybrid::data::{CsvMarketData, MarketDataSource};
use crypto_hybrid::journal::TracingRecorder;
use crypto_hybrid::{ExecutionMode, TradingEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{load_config, rule};

pub fn run(data_path: PathBuf, config_path: Option<PathBuf>, base_override: Option<String>) -> Result<()> {
    let config = load_config(config_path.as_deref(), base_override)?;
    let symbol = config.account.symbol();
    let window = config.backtest.window;
    let depth = config.execution.book.levels;

    let source = CsvMarketData::new(config.execution.book.clone(), config.execution.seed)
        .load(symbol.clone(), &data_path)?;
    let mut engine = TradingEngine::new(config, ExecutionMode::Simulation, Arc::new(TracingRecorder))?;

    let signal = engine.analyze_from(&source, "csv", window, depth);
    let book = source.fetch_order_book(&symbol, depth).ok();
    let condition = engine.manager().last_condition().copied();

    println!("\n{}", rule());
    println!("ANALYSIS - {}", symbol);
    println!("{}", rule());
    if let Some(c) = condition {
        println!("Regime:             {} ({:.0}% confidence)", c.regime, c.confidence);
        println!("Volatility:         {:.4}", c.volatility);
        println!("Trend Strength:     {:.2}", c.trend_strength);
        println!("Liquidity:          {:.2}", c.liquidity);
    }
    if let Some(book) = book {
        println!("Bid / Ask:          {:.2} / {:.2}", book.bid, book.ask);
    }
    println!("Strategy:           {}", signal.strategy);
    println!("Action:             {}", signal.action);
    println!("Confidence:         {:.1}", signal.confidence);
    if let Some(level) = signal.risk_level {
        println!("Risk Level:         {}", level);
    }
    println!("Entry:              {:.4}", signal.entry_price);
    println!("Stop Loss:          {:.4}", signal.stop_loss);
    println!("Take Profit:        {:.4}", signal.take_profit);
    println!("Quantity:           {:.6}", signal.quantity);
    for reason in &signal.reasons {
        println!("  - {}", reason);
    }
    println!("{}", rule());

    info!(action = %signal.action, strategy = %signal.strategy, "Analysis complete");
    Ok(())
}
