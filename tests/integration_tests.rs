//! Integration tests for the hybrid trading engine
//!
//! These tests drive the public API end to end: indicators, the grid
//! strategy, the hybrid selector with its risk gate, the execution
//! simulator, the backtester and the engine facade.

use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crypto_hybrid::backtest::{BacktestConfig, Backtester, ExitReason};
use crypto_hybrid::execution::{
    BookConfig, ExecutionConfig, ExecutionSimulator, OrderRequest, OrderStatus,
};
use crypto_hybrid::indicators;
use crypto_hybrid::journal::{LogRecord, MemoryRecorder, NullRecorder};
use crypto_hybrid::selector::HybridManager;
use crypto_hybrid::strategies::{GridDcaConfig, GridDcaStrategy, Strategy, StrategyId};
use crypto_hybrid::{
    BookLevel, Candle, Config, ExecutionMode, MarketSnapshot, Regime, Side, SignalAction, Symbol,
    TradingEngine,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Hourly candles from a close series, wicks padded around open and close
fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let start = start_time();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                start + Duration::hours(i as i64),
                open,
                open.max(close) * 1.002,
                open.min(close) * 0.998,
                close,
                1_000.0 + (i % 7) as f64 * 50.0,
            )
            .unwrap()
        })
        .collect()
}

/// Oscillating market with a slow drift, enough to trigger trades
fn generate_mock_candles(count: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let t = i as f64;
            100.0 + 6.0 * (t / 9.0).sin() + 2.0 * (t / 23.0).cos() + t * 0.01
        })
        .collect();
    candles_from_closes(&closes)
}

/// Steady climb the classifier labels TRENDING
fn generate_trending_candles(count: usize, start: DateTime<Utc>) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let c = 100.0 + i as f64 * 0.5;
            Candle::new(start + Duration::hours(i as i64), c, c + 0.3, c - 0.2, c, 1_000.0)
                .unwrap()
        })
        .collect()
}

fn single_candle(price: f64) -> Vec<Candle> {
    vec![Candle::new(start_time(), price, price, price, price, 1.0).unwrap()]
}

fn book() -> MarketSnapshot {
    MarketSnapshot::from_levels(
        vec![
            BookLevel::new(99.95, 20.0),
            BookLevel::new(99.90, 30.0),
            BookLevel::new(99.80, 50.0),
        ],
        vec![
            BookLevel::new(100.05, 20.0),
            BookLevel::new(100.10, 30.0),
            BookLevel::new(100.20, 50.0),
        ],
    )
    .unwrap()
}

// =============================================================================
// Indicators
// =============================================================================

#[test]
fn test_rsi_rising_series_above_midpoint() {
    let prices: Vec<f64> = (0..16).map(|i| 100.0 + i as f64).collect();
    assert!(indicators::rsi_last(&prices, 14) > 50.0);
}

#[test]
fn test_rsi_flat_series_is_neutral() {
    let prices = vec![100.0; 20];
    assert_eq!(indicators::rsi_last(&prices, 14), 50.0);
}

#[test]
fn test_rsi_short_history_is_neutral() {
    let prices = vec![100.0, 101.0, 102.0];
    assert_eq!(indicators::rsi_last(&prices, 14), 50.0);
}

// =============================================================================
// Grid DCA
// =============================================================================

#[test]
fn test_grid_deep_drop_closes_all() {
    let config = GridDcaConfig::default().with_grid(10.0, 1.0).with_max_exposure(20.0);
    let mut grid = GridDcaStrategy::new(config, 10_000.0);
    grid.initialize(100.0);

    let signal = grid.analyze(&single_candle(85.0), None);
    assert_eq!(signal.action, SignalAction::CloseAll);
    assert_eq!(signal.confidence, 90.0);
    // re-anchored at the stop price
    assert_relative_eq!(grid.state().unwrap().reference_price, 85.0);
}

#[test]
fn test_grid_walks_down_the_ladder_within_exposure() {
    let config = GridDcaConfig::default().with_grid(10.0, 1.0).with_max_exposure(20.0);
    let mut grid = GridDcaStrategy::new(config, 10_000.0);
    grid.initialize(100.0);

    let mut buys = 0;
    for step in 1..=9 {
        let price = 100.0 - step as f64 - 0.1;
        let signal = grid.analyze(&single_candle(price), None);
        if signal.action == SignalAction::Buy {
            grid.on_fill(Side::Buy, signal.quantity, price);
            buys += 1;
        }
        assert!(grid.exposure_pct() <= 20.0 + 1e-9);
    }
    assert!(buys > 0);
    assert_eq!(grid.state().unwrap().filled_levels(), buys);
}

#[test]
fn test_blocked_grid_buy_leaves_no_inventory() {
    let mut manager = HybridManager::new(&Config::default(), Arc::new(NullRecorder));
    let t0 = start_time() + Duration::days(10);
    manager.force_strategy(StrategyId::GridDca, &single_candle(100.0), t0);

    // no room left under the position limit: level 1 is reached but blocked
    manager.set_position_size(1e12);
    let blocked = manager.analyze_at(&single_candle(98.9), None, t0 + Duration::seconds(1));
    assert_eq!(blocked.action, SignalAction::Hold);

    manager.set_position_size(0.0);
    let rally = manager.analyze_at(&single_candle(101.0), None, t0 + Duration::seconds(2));
    assert_eq!(manager.current_strategy(), StrategyId::GridDca);
    assert_ne!(rally.action, SignalAction::Sell);
}

// =============================================================================
// Hybrid selector
// =============================================================================

#[test]
fn test_hysteresis_blocks_rapid_switching() {
    let recorder = Arc::new(MemoryRecorder::new());
    let mut manager = HybridManager::new(&Config::default(), recorder.clone());
    let t0 = start_time() + Duration::days(10);

    let trending = generate_trending_candles(60, start_time());
    manager.analyze_at(&trending, None, t0);
    assert_eq!(manager.current_strategy(), StrategyId::TrendFollowing);
    assert_eq!(manager.last_condition().unwrap().regime, Regime::Trending);

    // a short window reads as ILLIQUID, which prefers the grid
    let short = &trending[..20];
    manager.analyze_at(short, None, t0 + Duration::seconds(60));
    assert_eq!(manager.last_condition().unwrap().regime, Regime::Illiquid);
    assert_eq!(manager.current_strategy(), StrategyId::TrendFollowing);

    manager.analyze_at(short, None, t0 + Duration::seconds(299));
    assert_eq!(manager.current_strategy(), StrategyId::TrendFollowing);

    manager.analyze_at(short, None, t0 + Duration::seconds(300));
    assert_eq!(manager.current_strategy(), StrategyId::GridDca);
    assert_eq!(manager.last_switch(), Some(t0 + Duration::seconds(300)));

    let switches: Vec<(Option<StrategyId>, StrategyId)> = recorder
        .records()
        .into_iter()
        .filter_map(|r| match r {
            LogRecord::Decision { from, strategy, .. } => Some((from, strategy)),
            _ => None,
        })
        .collect();
    assert_eq!(
        switches,
        vec![
            (Some(StrategyId::MeanReversion), StrategyId::TrendFollowing),
            (Some(StrategyId::TrendFollowing), StrategyId::GridDca),
        ]
    );
}

#[test]
fn test_hysteresis_counts_from_first_analysis_without_switch() {
    let mut config = Config::default();
    config.selector.initial_strategy = StrategyId::GridDca;
    let mut manager = HybridManager::new(&config, Arc::new(NullRecorder));
    let t0 = start_time() + Duration::days(10);
    let trending = generate_trending_candles(60, start_time());

    // ILLIQUID already prefers the initial strategy, so nothing switches
    manager.analyze_at(&trending[..20], None, t0);
    assert_eq!(manager.current_strategy(), StrategyId::GridDca);
    assert!(manager.last_switch().is_none());

    manager.analyze_at(&trending, None, t0 + Duration::seconds(60));
    assert_eq!(manager.current_strategy(), StrategyId::GridDca);

    manager.analyze_at(&trending, None, t0 + Duration::seconds(300));
    assert_eq!(manager.current_strategy(), StrategyId::TrendFollowing);
}

#[test]
fn test_forced_switch_ignores_hysteresis() {
    let mut manager = HybridManager::new(&Config::default(), Arc::new(NullRecorder));
    let trending = generate_trending_candles(60, start_time());
    let t0 = start_time() + Duration::days(10);

    manager.analyze_at(&trending, None, t0);
    manager.force_strategy(StrategyId::Scalping, &trending, t0 + Duration::seconds(1));
    assert_eq!(manager.current_strategy(), StrategyId::Scalping);
}

#[test]
fn test_risk_halt_is_sticky_until_reset() {
    let recorder = Arc::new(MemoryRecorder::new());
    let mut manager = HybridManager::new(&Config::default(), recorder.clone());
    let trending = generate_trending_candles(60, start_time());

    // 20% drawdown against a 15% limit
    manager.record_trade_result(-2_000.0);
    for _ in 0..3 {
        let signal = manager.analyze(&trending, None);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.quantity, 0.0);
        assert!(manager.risk_state().should_stop);
    }

    let risk_logs = recorder
        .records()
        .into_iter()
        .filter(|r| matches!(r, LogRecord::Risk { should_stop: true, .. }))
        .count();
    assert_eq!(risk_logs, 1);

    // a new day clears the daily loss, but the drawdown is still breached
    manager.reset_daily();
    assert!(!manager.risk_state().should_stop);
    let signal = manager.analyze(&trending, None);
    assert_eq!(signal.action, SignalAction::Hold);
    assert!(manager.risk_state().should_stop);

    manager.reset_account(10_000.0);
    assert!(!manager.risk_state().should_stop);
    manager.analyze(&trending, None);
    assert!(!manager.risk_state().should_stop);
    assert_eq!(manager.risk_state().current_drawdown, 0.0);
}

#[test]
fn test_selector_signal_carries_regime_and_risk_level() {
    let mut manager = HybridManager::new(&Config::default(), Arc::new(NullRecorder));
    let signal = manager.analyze(&generate_trending_candles(60, start_time()), None);
    assert_eq!(signal.regime, Some(Regime::Trending));
    assert!(signal.risk_level.is_some());
    assert_eq!(signal.strategy, StrategyId::TrendFollowing);
}

// =============================================================================
// Execution simulator
// =============================================================================

#[test]
fn test_simulator_books_fills_into_account() {
    let symbol = Symbol::new("BTCUSDT");
    let mut sim = ExecutionSimulator::new(
        ExecutionConfig::default().with_partial_fill_probability(0.0),
        10_000.0,
    );

    let bought = sim.execute(&OrderRequest::market(symbol.clone(), Side::Buy, 25.0), &book());
    assert_eq!(bought.status, OrderStatus::Filled);
    assert_eq!(bought.fills.len(), 2);
    assert_relative_eq!(sim.account().holding(&symbol), 25.0);
    assert_relative_eq!(
        sim.account().quote_balance(),
        10_000.0 - bought.notional() - bought.fees,
        epsilon = 1e-6
    );

    let sold = sim.execute(&OrderRequest::market(symbol.clone(), Side::Sell, 25.0), &book());
    assert_eq!(sold.status, OrderStatus::Filled);
    assert_relative_eq!(sim.account().holding(&symbol), 0.0, epsilon = 1e-9);
    assert!(sim.account().quote_balance() < 10_000.0);
}

#[test]
fn test_synthetic_book_is_seeded() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let config = BookConfig::default();
    let a = config.generate(50_000.0, &mut StdRng::seed_from_u64(7)).unwrap();
    let b = config.generate(50_000.0, &mut StdRng::seed_from_u64(7)).unwrap();
    assert_eq!(a, b);
    assert!(a.bid < a.ask);
    assert_eq!(a.bids.len(), config.levels);
}

// =============================================================================
// Backtest
// =============================================================================

#[test]
fn test_backtest_is_deterministic() {
    let candles = generate_mock_candles(700);
    let config = Config::default();

    let first = Backtester::new(config.clone()).run(&candles);
    let second = Backtester::new(config).run(&candles);
    assert_eq!(first, second);
}

#[test]
fn test_backtest_accounting_is_consistent() {
    let candles = generate_mock_candles(700);
    let mut config = Config::default();
    config.backtest = BacktestConfig::default().with_confidence_threshold(0.0);
    let result = Backtester::new(config).run(&candles);

    let m = &result.metrics;
    assert_eq!(m.total_trades, result.trades.len());
    assert_eq!(m.winning_trades + m.losing_trades, m.total_trades);
    let profit: f64 = result.trades.iter().map(|t| t.profit).sum();
    assert_relative_eq!(m.final_balance, result.initial_balance + profit, epsilon = 1e-6);

    for pair in result.trades.windows(2) {
        assert!(pair[1].entry_time > pair[0].exit_time);
    }
    for trade in &result.trades {
        assert!(trade.hold_secs > 0);
        assert!(trade.quantity > 0.0);
        assert!(trade.fees >= 0.0);
        if trade.exit_reason == ExitReason::StopLoss {
            assert!(trade.profit < 0.0);
        }
    }
}

#[test]
fn test_backtest_too_short_history_has_no_trades() {
    let candles = generate_mock_candles(150);
    let result = Backtester::new(Config::default()).run(&candles);
    assert!(result.trades.is_empty());
    assert_eq!(result.metrics.total_trades, 0);
    assert_relative_eq!(result.metrics.final_balance, result.initial_balance);
}

// =============================================================================
// Engine
// =============================================================================

#[tokio::test]
async fn test_engine_replay_keeps_account_sound() {
    let mut config = Config::default();
    config.execution.seed = 11;
    let mut engine =
        TradingEngine::new(config, ExecutionMode::Simulation, Arc::new(NullRecorder)).unwrap();
    let symbol = engine.symbol().clone();
    let candles = generate_mock_candles(400);

    let mut placed = 0;
    for i in 200..candles.len() {
        let window = &candles[i - 199..=i];
        let signal = engine.analyze(window, None);
        if let Some(order) = engine.execute_signal(&signal, None).await.unwrap() {
            placed += 1;
            assert!(order.executed_quantity <= order.quantity + 1e-12);
        }
        engine.mark_to_market(candles[i].close);

        assert!(engine.account().quote_balance() >= -1e-9);
        assert!(engine.account().holding(&symbol) >= -1e-12);
    }

    let position = engine.position();
    assert_relative_eq!(position.quantity, engine.account().holding(&symbol), epsilon = 1e-9);
    assert!(placed <= 200);
}

#[test]
fn test_engine_backtest_matches_backtester() {
    let candles = generate_mock_candles(500);
    let engine =
        TradingEngine::new(Config::default(), ExecutionMode::Simulation, Arc::new(NullRecorder))
            .unwrap();
    let direct = Backtester::new(Config::default()).run(&candles);
    assert_eq!(engine.run_backtest(&candles), direct);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_rsi_is_bounded(prices in prop::collection::vec(1.0..1_000.0_f64, 1..120)) {
        let value = indicators::rsi_last(&prices, 14);
        prop_assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn prop_grid_exposure_never_exceeds_limit(
        path in prop::collection::vec(80.0..120.0_f64, 1..80),
        max_exposure in 1.0..50.0_f64,
    ) {
        let config = GridDcaConfig::default().with_max_exposure(max_exposure);
        let mut grid = GridDcaStrategy::new(config, 10_000.0);
        grid.initialize(100.0);
        for price in path {
            let signal = grid.analyze(&single_candle(price), None);
            if signal.action == SignalAction::Buy {
                grid.on_fill(Side::Buy, signal.quantity, price);
            }
            prop_assert!(grid.exposure_pct() <= max_exposure + 1e-6);
        }
    }

    #[test]
    fn prop_simulated_fills_respect_limits(
        quantity in 0.2..120.0_f64,
        partial in 0.0..1.0_f64,
        seed in any::<u64>(),
        sell in any::<bool>(),
    ) {
        let symbol = Symbol::new("BTCUSDT");
        let config = ExecutionConfig::default()
            .with_seed(seed)
            .with_partial_fill_probability(partial);
        let max_slippage = config.max_slippage;
        let fee_rate = config.fee_rate;
        let mut sim = ExecutionSimulator::new(config, 1_000_000.0);

        if sell {
            // inventory to sell from
            sim.execute(&OrderRequest::market(symbol.clone(), Side::Buy, 100.0), &book());
        }
        let side = if sell { Side::Sell } else { Side::Buy };
        let order = sim.execute(&OrderRequest::market(symbol, side, quantity), &book());

        if order.status != OrderStatus::Rejected {
            prop_assert!(order.executed_quantity > 0.0);
            prop_assert!(order.executed_quantity <= order.quantity + 1e-9);
            prop_assert!(order.slippage <= max_slippage + 1e-12);
            prop_assert!(order.fees >= 0.0);
            prop_assert!((order.fees - order.notional() * fee_rate).abs() < 1e-6);
        }
    }
}
