//! Backtesting engine
//!
//! Replays candles through the hybrid selector one step at a time. An
//! actionable signal above the confidence threshold opens a simulated trade
//! that is resolved by scanning forward for the first bar touching its stop or
//! target, or times out at the end of the lookahead window. Replay then
//! resumes after the exit bar.
//!
//! All randomness (entry slippage, synthetic books) is drawn from one seeded
//! RNG, so a run is a pure function of candles and configuration.

pub mod metrics;
pub mod walk_forward;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::execution::BookConfig;
use crate::journal::{DecisionRecorder, LogRecord, NullRecorder};
use crate::selector::HybridManager;
use crate::strategies::StrategyId;
use crate::{Candle, Config, Side, Signal};

pub use metrics::{calculate_metrics, PerformanceMetrics};
pub use walk_forward::{run_walk_forward, WalkForwardResult, WindowResult};

/// Minimum number of bars replayed before the first decision
pub const MIN_WARMUP: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Warm-up bars; values below 200 are raised to 200 (default: 200)
    pub warmup: usize,
    /// Trailing bars passed to each analysis (default: 200)
    pub window: usize,
    /// Bars scanned for a stop or target before timing out (default: 48)
    pub lookahead: usize,
    /// Signals must be strictly above this confidence (default: 60)
    pub confidence_threshold: f64,
    /// Adverse entry slippage, scaled by U(0.5, 1.5) per trade (default: 0.0005)
    pub entry_slippage: f64,
    /// Adverse slippage on stop exits (default: 0.001)
    pub exit_slippage: f64,
    /// Fee on entry and exit notional (default: 0.001)
    pub fee_rate: f64,
    pub seed: u64,
    /// Synthetic book generated around each bar's close
    pub book: BookConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            warmup: MIN_WARMUP,
            window: 200,
            lookahead: 48,
            confidence_threshold: 60.0,
            entry_slippage: 0.0005,
            exit_slippage: 0.001,
            fee_rate: 0.001,
            seed: 42,
            book: BookConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_lookahead(mut self, bars: usize) -> Self {
        self.lookahead = bars;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Warm-up actually applied
    pub fn effective_warmup(&self) -> usize {
        self.warmup.max(MIN_WARMUP)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 || self.lookahead == 0 {
            return Err(ConfigError::Inconsistent {
                section: "backtest",
                message: "window and lookahead must be at least 1 bar".to_string(),
            });
        }
        ConfigError::check_range(
            "backtest",
            "confidence_threshold",
            self.confidence_threshold,
            0.0,
            100.0,
        )?;
        ConfigError::check_range("backtest", "entry_slippage", self.entry_slippage, 0.0, 0.05)?;
        ConfigError::check_range("backtest", "exit_slippage", self.exit_slippage, 0.0, 0.05)?;
        ConfigError::check_range("backtest", "fee_rate", self.fee_rate, 0.0, 0.05)?;
        self.book.validate()
    }
}

/// Sliding windows for stability testing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Bars per window, warm-up included (default: 1000)
    pub window_size: usize,
    /// Bars between window starts; less than `window_size` overlaps (default: 500)
    pub step: usize,
    /// Run windows on the rayon pool (default: true)
    pub parallel: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            window_size: 1_000,
            step: 500,
            parallel: true,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::Inconsistent {
                section: "walk_forward",
                message: "step must be at least 1 bar".to_string(),
            });
        }
        if self.window_size <= MIN_WARMUP {
            return Err(ConfigError::Inconsistent {
                section: "walk_forward",
                message: format!(
                    "window_size ({}) must exceed the {}-bar warm-up",
                    self.window_size, MIN_WARMUP
                ),
            });
        }
        Ok(())
    }
}

/// How a simulated trade ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Timeout,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Closed simulated trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy: StrategyId,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Net of fees
    pub profit: f64,
    pub fees: f64,
    pub hold_secs: i64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// Net profit relative to entry notional
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.quantity;
        if notional > 0.0 {
            self.profit / notional
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub datetime: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    /// Bars on which the selector was consulted
    pub decisions: usize,
    /// Risk halt still in force at the end of the replay
    pub halted: bool,
}

/// Backtest engine
pub struct Backtester {
    config: Config,
    recorder: Arc<dyn DecisionRecorder>,
}

impl Backtester {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            recorder: Arc::new(NullRecorder),
        }
    }

    /// Receive the selector's decision and risk logs plus one trade log per
    /// closed trade
    pub fn with_recorder(mut self, recorder: Arc<dyn DecisionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replay `candles` (time-ordered) with a fresh selector
    pub fn run(&self, candles: &[Candle]) -> BacktestResult {
        let bt = &self.config.backtest;
        let initial_balance = self.config.account.initial_balance;
        let warmup = bt.effective_warmup();

        let mut result = BacktestResult {
            initial_balance,
            metrics: calculate_metrics(&[], initial_balance),
            ..BacktestResult::default()
        };
        if candles.len() <= warmup {
            info!(
                candles = candles.len(),
                warmup, "Not enough candles for backtest warm-up"
            );
            return result;
        }

        let mut rng = StdRng::seed_from_u64(bt.seed);
        let mut manager = HybridManager::new(&self.config, self.recorder.clone());
        let mut balance = initial_balance;
        let mut day = candles[warmup].datetime.date_naive();

        result.equity_curve.push(EquityPoint {
            datetime: candles[warmup - 1].datetime,
            equity: balance,
        });

        let mut i = warmup;
        while i < candles.len() {
            let candle = &candles[i];
            if candle.datetime.date_naive() != day {
                day = candle.datetime.date_naive();
                manager.reset_daily();
            }

            let start = (i + 1).saturating_sub(bt.window);
            let window = &candles[start..=i];
            let snapshot = bt.book.generate(candle.close, &mut rng).ok();
            let signal = manager.analyze(window, snapshot.as_ref());
            result.decisions += 1;

            let side = match signal.action.side() {
                Some(side) if signal.confidence > bt.confidence_threshold => side,
                _ => {
                    i += 1;
                    continue;
                }
            };

            match self.simulate_trade(&signal, side, candles, i, balance, &mut rng) {
                Some((trade, exit_index)) => {
                    debug!(
                        strategy = %trade.strategy,
                        side = %trade.side,
                        entry = trade.entry_price,
                        exit = trade.exit_price,
                        profit = trade.profit,
                        reason = %trade.exit_reason,
                        "Trade closed"
                    );
                    balance += trade.profit;
                    manager.on_fill(trade.strategy, side, trade.quantity, trade.entry_price);
                    manager.on_fill(trade.strategy, side.opposite(), trade.quantity, trade.exit_price);
                    manager.record_trade_result(trade.profit);
                    self.recorder.record(&LogRecord::Trade {
                        timestamp: trade.exit_time,
                        symbol: manager.symbol().clone(),
                        strategy: trade.strategy,
                        side: trade.side,
                        quantity: trade.quantity,
                        price: trade.exit_price,
                        pnl: Some(trade.profit),
                        detail: trade.exit_reason.to_string(),
                    });
                    result.equity_curve.push(EquityPoint {
                        datetime: trade.exit_time,
                        equity: balance,
                    });
                    result.trades.push(trade);
                    i = exit_index + 1;
                }
                None => i += 1,
            }
        }

        result.halted = manager.risk_state().should_stop;
        result.metrics = calculate_metrics(&result.trades, initial_balance);
        info!(
            trades = result.trades.len(),
            decisions = result.decisions,
            total_return = result.metrics.total_return,
            max_drawdown = result.metrics.max_drawdown,
            "Backtest complete"
        );
        result
    }

    /// Open at bar `i` and scan forward for the exit. Returns the trade and
    /// the index of the exit bar, or `None` when the signal cannot be traded.
    fn simulate_trade(
        &self,
        signal: &Signal,
        side: Side,
        candles: &[Candle],
        i: usize,
        balance: f64,
        rng: &mut StdRng,
    ) -> Option<(TradeRecord, usize)> {
        let bt = &self.config.backtest;
        let sign = side.sign();
        let (stop, target) = (signal.stop_loss, signal.take_profit);

        // stop must sit on the losing side of entry and the target on the winning side
        if (signal.entry_price - stop) * sign <= 0.0 || (target - signal.entry_price) * sign <= 0.0 {
            return None;
        }

        let slippage = bt.entry_slippage * rng.gen_range(0.5..1.5);
        let entry_price = signal.entry_price * (1.0 + sign * slippage);
        let affordable = balance / (entry_price * (1.0 + bt.fee_rate));
        let quantity = signal.quantity.min(affordable);
        if quantity <= 0.0 || !quantity.is_finite() {
            return None;
        }

        let last = (i + bt.lookahead).min(candles.len() - 1);
        if last <= i {
            return None;
        }
        let mut exit = None;
        for (j, bar) in candles.iter().enumerate().take(last + 1).skip(i + 1) {
            let (stop_hit, target_hit) = match side {
                Side::Buy => (bar.low <= stop, bar.high >= target),
                Side::Sell => (bar.high >= stop, bar.low <= target),
            };
            // both touched in one bar: assume the stop came first
            if stop_hit {
                exit = Some((j, stop * (1.0 - sign * bt.exit_slippage), ExitReason::StopLoss));
                break;
            }
            if target_hit {
                exit = Some((j, target, ExitReason::TakeProfit));
                break;
            }
        }
        let (exit_index, exit_price, exit_reason) =
            exit.unwrap_or((last, candles[last].close, ExitReason::Timeout));

        let fees = (entry_price + exit_price) * quantity * bt.fee_rate;
        let profit = sign * (exit_price - entry_price) * quantity - fees;
        let entry_time = candles[i].datetime;
        let exit_time = candles[exit_index].datetime;

        Some((
            TradeRecord {
                strategy: signal.strategy,
                side,
                entry_time,
                exit_time,
                entry_price,
                exit_price,
                quantity,
                profit,
                fees,
                hold_secs: (exit_time - entry_time).num_seconds(),
                exit_reason,
            },
            exit_index,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryRecorder;
    use chrono::{Duration, TimeZone};

    fn candles(n: usize, f: impl Fn(usize) -> f64) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = f(i);
                let open = if i == 0 { close } else { f(i - 1) };
                Candle::new_unchecked(
                    start + Duration::hours(i as i64),
                    open,
                    open.max(close) * 1.002,
                    open.min(close) * 0.998,
                    close,
                    1_000.0 + (i % 7) as f64 * 50.0,
                )
            })
            .collect()
    }

    fn wave(i: usize) -> f64 {
        100.0 + 8.0 * (i as f64 / 9.0).sin() + 0.02 * i as f64
    }

    #[test]
    fn test_short_history_returns_empty_result() {
        let result = Backtester::new(Config::default()).run(&candles(150, wave));
        assert!(result.trades.is_empty());
        assert_eq!(result.decisions, 0);
        assert_eq!(result.metrics.final_balance, 10_000.0);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let data = candles(600, wave);
        let backtester = Backtester::new(Config::default());
        let first = backtester.run(&data);
        let second = backtester.run(&data);
        assert_eq!(first, second);
        assert!(first.decisions > 0);
    }

    #[test]
    fn test_trades_are_ordered_and_consistent() {
        let data = candles(800, wave);
        let recorder = Arc::new(MemoryRecorder::new());
        let result = Backtester::new(Config::default())
            .with_recorder(recorder.clone())
            .run(&data);

        for pair in result.trades.windows(2) {
            assert!(pair[0].exit_time < pair[1].entry_time);
        }
        for trade in &result.trades {
            assert!(trade.fees >= 0.0);
            assert!(trade.hold_secs > 0);
            assert!(trade.hold_secs <= 48 * 3_600);
        }
        let trade_logs = recorder
            .records()
            .iter()
            .filter(|r| matches!(r, LogRecord::Trade { .. }))
            .count();
        assert_eq!(trade_logs, result.trades.len());
        assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
    }

    #[test]
    fn test_timeout_exit_at_last_scanned_close() {
        let config = Config::default();
        let backtester = Backtester::new(config);
        let data = candles(260, |_| 100.0);
        let signal = Signal::directional(
            StrategyId::TrendFollowing,
            crate::SignalAction::Buy,
            80.0,
            100.0,
            50.0,
            150.0,
            1.0,
            vec![],
        );
        let mut rng = StdRng::seed_from_u64(1);
        let (trade, exit_index) = backtester
            .simulate_trade(&signal, Side::Buy, &data, 200, 10_000.0, &mut rng)
            .unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Timeout);
        assert_eq!(exit_index, 248);
        assert_eq!(trade.exit_price, 100.0);
        assert!(trade.entry_price > 100.0);
        assert!(trade.profit < 0.0);
    }

    #[test]
    fn test_stop_wins_ties_and_pays_exit_slippage() {
        let backtester = Backtester::new(Config::default());
        let mut data = candles(210, |_| 100.0);
        data[201].high = 120.0;
        data[201].low = 80.0;
        let signal = Signal::directional(
            StrategyId::MeanReversion,
            crate::SignalAction::Buy,
            80.0,
            100.0,
            90.0,
            110.0,
            2.0,
            vec![],
        );
        let mut rng = StdRng::seed_from_u64(1);
        let (trade, exit_index) = backtester
            .simulate_trade(&signal, Side::Buy, &data, 200, 10_000.0, &mut rng)
            .unwrap();
        assert_eq!(exit_index, 201);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!(trade.exit_price < 90.0);
    }

    #[test]
    fn test_untradeable_levels_are_skipped() {
        let backtester = Backtester::new(Config::default());
        let data = candles(210, |_| 100.0);
        let inverted = Signal::directional(
            StrategyId::Scalping,
            crate::SignalAction::Sell,
            80.0,
            100.0,
            95.0,
            105.0,
            1.0,
            vec![],
        );
        let mut rng = StdRng::seed_from_u64(1);
        assert!(backtester
            .simulate_trade(&inverted, Side::Sell, &data, 200, 10_000.0, &mut rng)
            .is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(BacktestConfig::default().validate().is_ok());
        assert_eq!(
            BacktestConfig {
                warmup: 50,
                ..BacktestConfig::default()
            }
            .effective_warmup(),
            200
        );
        assert!(WalkForwardConfig {
            step: 0,
            ..WalkForwardConfig::default()
        }
        .validate()
        .is_err());
    }
}
