//! Simulate command implementation
//!
//! Feeds the history bar by bar through a simulation-mode engine, placing
//! every actionable signal on the execution simulator.

use anyhow::Result;
use crypto_hybrid::backtest::MIN_WARMUP;
use crypto_hybrid::data;
use crypto_hybrid::execution::OrderStatus;
use crypto_hybrid::journal::TracingRecorder;
use crypto_hybrid::{ExecutionMode, TradingEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{load_config, rule};

pub fn run(
    data_path: PathBuf,
    config_path: Option<PathBuf>,
    base_override: Option<String>,
    latency: bool,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), base_override)?;
    if latency {
        config.execution.simulate_latency = true;
    }

    let candles = data::load_csv(&data_path)?;
    let window = config.backtest.window;
    let book_config = config.execution.book.clone();
    let mut book_rng = StdRng::seed_from_u64(config.execution.seed.wrapping_add(1));
    let initial_balance = config.account.initial_balance;
    let quote = config.account.quote_asset.clone();

    let runtime = tokio::runtime::Runtime::new()?;
    let mut engine = TradingEngine::new(config, ExecutionMode::Simulation, Arc::new(TracingRecorder))?;
    let symbol = engine.symbol().clone();

    info!("Simulating {} candles for {}", candles.len(), symbol);

    let mut statuses: BTreeMap<String, usize> = BTreeMap::new();
    let mut last_close = 0.0;
    let mut day = None;

    runtime.block_on(async {
        for i in MIN_WARMUP.min(candles.len())..candles.len() {
            let candle = &candles[i];
            last_close = candle.close;
            let today = candle.datetime.date_naive();
            if day.is_some_and(|d| d != today) {
                engine.reset_daily();
            }
            day = Some(today);

            let book = match book_config.generate(candle.close, &mut book_rng) {
                Ok(book) => book,
                Err(e) => {
                    warn!(error = %e, "Skipping bar without a valid book");
                    continue;
                }
            };

            let start = (i + 1).saturating_sub(window);
            let signal = engine.analyze(&candles[start..=i], Some(&book));
            if signal.is_actionable() {
                match engine.execute_signal(&signal, Some(&book)).await {
                    Ok(Some(order)) => {
                        *statuses.entry(format!("{:?}", order.status)).or_insert(0) += 1;
                        if order.status == OrderStatus::Rejected {
                            info!(id = %order.id, reason = ?order.reject_reason, "Order rejected");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Execution failed"),
                }
            }
            engine.mark_to_market(candle.close);
        }
    });

    let account = engine.account();
    let equity = account.equity(&symbol, last_close);
    let risk = engine.risk_state();
    let latency = engine.latency_stats();

    println!("\n{}", rule());
    println!("SIMULATION RESULTS - {}", symbol);
    println!("{}", rule());
    println!("Initial Balance:    {:.2} {}", initial_balance, quote);
    println!("Final Equity:       {:.2} {}", equity, quote);
    println!("Quote Balance:      {:.2} {}", account.quote_balance(), quote);
    println!("Holdings:           {:.6}", account.holding(&symbol));
    println!("Return:             {:.2}%", (equity / initial_balance - 1.0) * 100.0);
    println!("Drawdown:           {:.2}%", risk.current_drawdown * 100.0);
    println!("Trading Halted:     {}", risk.should_stop);
    for (status, count) in &statuses {
        println!("  {:<18} {}", status, count);
    }
    if latency.count > 0 {
        println!(
            "Latency:            mean {:.0}ms, max {}ms over {} orders",
            latency.mean_ms, latency.max_ms, latency.count
        );
    }
    println!("{}", rule());

    info!("Simulation completed");
    Ok(())
}
