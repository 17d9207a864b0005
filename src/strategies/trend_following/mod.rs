//! Trend Following Strategy
//!
//! Rides established trends confirmed by EMA alignment, MACD momentum and ADX.

mod config;
mod strategy;

pub use config::TrendFollowingConfig;
pub use strategy::TrendFollowingStrategy;

use super::{StrategiesConfig, Strategy};

/// Create strategy from config (called by the factory table)
pub fn create(config: &StrategiesConfig, balance: f64) -> Box<dyn Strategy> {
    Box::new(TrendFollowingStrategy::new(
        config.trend_following.clone(),
        config.sizing.clone(),
        balance,
    ))
}
