//! Walk-forward stability test
//!
//! Re-runs the full backtest over sliding windows of the history. Windows are
//! independent (fresh selector, seed `seed + index`), so they fan out over the
//! rayon pool; results come back in window order either way.

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use super::{Backtester, PerformanceMetrics};
use crate::{Candle, Config};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub index: usize,
    /// Bar range `[start, end)` in the full history
    pub start: usize,
    pub end: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seed: u64,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowResult>,
    /// Mean total return across windows (percent)
    pub mean_return: f64,
    /// Sample standard deviation of window returns
    pub std_return: f64,
    /// Fraction of windows with a positive return
    pub profitable_share: f64,
}

/// `[start, end)` bounds of every full window
pub fn window_bounds(len: usize, window_size: usize, step: usize) -> Vec<(usize, usize)> {
    if window_size == 0 || step == 0 || len < window_size {
        return Vec::new();
    }
    (0..=len - window_size)
        .step_by(step)
        .map(|start| (start, start + window_size))
        .collect()
}

pub fn run_walk_forward(config: &Config, candles: &[Candle], progress: &ProgressBar) -> WalkForwardResult {
    let wf = &config.walk_forward;
    let bounds = window_bounds(candles.len(), wf.window_size, wf.step);
    info!(
        windows = bounds.len(),
        window_size = wf.window_size,
        step = wf.step,
        parallel = wf.parallel,
        "Starting walk-forward"
    );
    progress.set_length(bounds.len() as u64);

    let run_window = |(index, &(start, end)): (usize, &(usize, usize))| {
        let seed = config.backtest.seed.wrapping_add(index as u64);
        let mut window_config = config.clone();
        window_config.backtest.seed = seed;
        let result = Backtester::new(window_config).run(&candles[start..end]);
        progress.inc(1);
        WindowResult {
            index,
            start,
            end,
            start_time: candles[start].datetime,
            end_time: candles[end - 1].datetime,
            seed,
            metrics: result.metrics,
        }
    };

    let windows: Vec<WindowResult> = if wf.parallel {
        bounds.par_iter().enumerate().map(run_window).collect()
    } else {
        bounds.iter().enumerate().map(run_window).collect()
    };
    progress.finish_with_message(format!("{} windows", windows.len()));

    summarize(windows)
}

fn summarize(windows: Vec<WindowResult>) -> WalkForwardResult {
    if windows.is_empty() {
        return WalkForwardResult::default();
    }
    let returns: Vec<f64> = windows.iter().map(|w| w.metrics.total_return).collect();
    let mean_return = returns.iter().copied().mean();
    let std_return = if returns.len() > 1 {
        returns.iter().copied().std_dev()
    } else {
        0.0
    };
    let profitable = returns.iter().filter(|r| **r > 0.0).count();

    WalkForwardResult {
        profitable_share: profitable as f64 / windows.len() as f64,
        mean_return,
        std_return,
        windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_window_bounds_overlap_and_stop_at_end() {
        assert_eq!(
            window_bounds(1_000, 400, 300),
            vec![(0, 400), (300, 700), (600, 1_000)]
        );
        assert_eq!(window_bounds(1_050, 400, 300).len(), 3);
        assert!(window_bounds(399, 400, 100).is_empty());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = (0..700)
            .map(|i| {
                let close = 100.0 + 6.0 * (i as f64 / 11.0).sin();
                Candle::new_unchecked(
                    start + Duration::hours(i),
                    close,
                    close * 1.003,
                    close * 0.997,
                    close,
                    1_000.0,
                )
            })
            .collect();

        let mut config = Config::default();
        config.walk_forward.window_size = 400;
        config.walk_forward.step = 150;

        config.walk_forward.parallel = true;
        let parallel = run_walk_forward(&config, &candles, &ProgressBar::hidden());
        config.walk_forward.parallel = false;
        let sequential = run_walk_forward(&config, &candles, &ProgressBar::hidden());

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.windows.len(), 3);
        assert_eq!(parallel.windows[1].seed, config.backtest.seed + 1);
        assert!((0.0..=1.0).contains(&parallel.profitable_share));
    }
}
