//! Walk-forward command implementation

use anyhow::Result;
use crypto_hybrid::backtest::run_walk_forward;
use crypto_hybrid::data;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use super::{load_config, rule};

pub fn run(
    data_path: PathBuf,
    config_path: Option<PathBuf>,
    window: Option<usize>,
    step: Option<usize>,
    sequential: bool,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), None)?;
    if let Some(window) = window {
        config.walk_forward.window_size = window;
    }
    if let Some(step) = step {
        config.walk_forward.step = step;
    }
    if sequential {
        config.walk_forward.parallel = false;
    }
    config.walk_forward.validate()?;

    let candles = data::load_csv(&data_path)?;

    println!("\n{}", rule());
    println!("WALK-FORWARD");
    println!("{}", rule());
    println!("  Candles:  {}", candles.len());
    println!("  Window:   {} bars", config.walk_forward.window_size);
    println!("  Step:     {} bars", config.walk_forward.step);
    println!(
        "  Mode:     {}",
        if config.walk_forward.parallel { "parallel" } else { "sequential" }
    );
    println!("{}\n", rule());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] {msg}")?
            .progress_chars("█░ "),
    );

    let result = run_walk_forward(&config, &candles, &pb);
    println!();

    if result.windows.is_empty() {
        info!("History shorter than one window, nothing to run");
        println!("No complete window in {} candles", candles.len());
        return Ok(());
    }

    println!(
        "{:>4}  {:<20} {:<20} {:>9} {:>8} {:>8} {:>7}",
        "#", "From", "To", "Return%", "MaxDD%", "Sharpe", "Trades"
    );
    for w in &result.windows {
        println!(
            "{:>4}  {:<20} {:<20} {:>9.2} {:>8.2} {:>8.2} {:>7}",
            w.index,
            w.start_time.format("%Y-%m-%d %H:%M"),
            w.end_time.format("%Y-%m-%d %H:%M"),
            w.metrics.total_return,
            w.metrics.max_drawdown,
            w.metrics.sharpe_ratio,
            w.metrics.total_trades
        );
    }
    println!("{}", rule());
    println!("Mean Return:        {:.2}%", result.mean_return);
    println!("Return Std Dev:     {:.2}%", result.std_return);
    println!("Profitable Windows: {:.0}%", result.profitable_share * 100.0);
    println!("{}", rule());

    info!(
        windows = result.windows.len(),
        mean_return = result.mean_return,
        "Walk-forward completed"
    );
    Ok(())
}
