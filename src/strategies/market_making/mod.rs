//! Market Making Strategy
//!
//! Quotes both sides around mid and leans the quotes against inventory.

mod config;
mod strategy;

pub use config::MarketMakingConfig;
pub use strategy::{MarketMakingStrategy, Quotes};

use super::{StrategiesConfig, Strategy};

/// Create strategy from config (called by the factory table)
pub fn create(config: &StrategiesConfig, _balance: f64) -> Box<dyn Strategy> {
    Box::new(MarketMakingStrategy::new(config.market_making.clone()))
}
