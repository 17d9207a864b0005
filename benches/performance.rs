//! Performance benchmarks for crypto-hybrid
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crypto_hybrid::backtest::Backtester;
use crypto_hybrid::execution::{ExecutionConfig, ExecutionSimulator, OrderRequest};
use crypto_hybrid::indicators;
use crypto_hybrid::journal::NullRecorder;
use crypto_hybrid::regime::RegimeClassifier;
use crypto_hybrid::selector::HybridManager;
use crypto_hybrid::{BookLevel, Candle, Config, MarketSnapshot, Side, Symbol};

fn candles(count: usize) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + 6.0 * (t / 9.0).sin() + t * 0.01;
            Candle::new_unchecked(
                start + Duration::hours(i as i64),
                close,
                close * 1.003,
                close * 0.997,
                close,
                1_000.0 + (i % 7) as f64 * 50.0,
            )
        })
        .collect()
}

fn benchmark_indicators(c: &mut Criterion) {
    let data = candles(200);
    let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = data.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = data.iter().map(|c| c.low).collect();

    c.bench_function("rsi_200", |b| b.iter(|| indicators::rsi_last(black_box(&closes), 14)));
    c.bench_function("atr_200", |b| {
        b.iter(|| indicators::atr_last(black_box(&highs), &lows, &closes, 14))
    });
    c.bench_function("adx_200", |b| {
        b.iter(|| indicators::adx_last(black_box(&highs), &lows, &closes, 14))
    });
    c.bench_function("classify_200", |b| {
        let classifier = RegimeClassifier::default();
        b.iter(|| classifier.classify(black_box(&data)))
    });
}

fn benchmark_cycle(c: &mut Criterion) {
    let data = candles(200);
    let mut manager = HybridManager::new(&Config::default(), Arc::new(NullRecorder));
    c.bench_function("selector_cycle", |b| b.iter(|| manager.analyze(black_box(&data), None)));

    let symbol = Symbol::new("BTCUSDT");
    let book = MarketSnapshot::from_levels(
        (0..10).map(|i| BookLevel::new(99.9 - i as f64 * 0.1, 5.0)).collect(),
        (0..10).map(|i| BookLevel::new(100.1 + i as f64 * 0.1, 5.0)).collect(),
    )
    .unwrap();
    c.bench_function("simulate_market_order", |b| {
        b.iter(|| {
            let mut sim = ExecutionSimulator::new(ExecutionConfig::default(), 100_000.0);
            sim.execute(&OrderRequest::market(symbol.clone(), Side::Buy, 12.0), black_box(&book))
        })
    });
}

fn benchmark_backtest(c: &mut Criterion) {
    let data = candles(2_000);
    let backtester = Backtester::new(Config::default());
    c.bench_function("backtest_2000", |b| b.iter(|| backtester.run(black_box(&data))));
}

criterion_group!(benches, benchmark_indicators, benchmark_cycle, benchmark_backtest);
criterion_main!(benches);
