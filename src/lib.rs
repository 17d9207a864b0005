//! Crypto Hybrid
//!
//! A decision engine for cryptocurrency spot trading. Each cycle classifies
//! the market regime from a candle window, picks one of five strategies with
//! hysteresis, gates the resulting signal through a risk manager and, in
//! simulation mode, fills it against a synthetic order book. A backtest
//! harness replays history through the same pipeline.

pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod journal;
pub mod regime;
pub mod risk;
pub mod selector;
pub mod strategies;
pub mod types;

pub use config::Config;
pub use engine::{ExecutionMode, LiveExecutor, TradingEngine};
pub use error::{ConfigError, EngineError};
pub use strategies::{Strategy, StrategyId};
pub use types::*;
