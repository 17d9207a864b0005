//! Scalping Strategy
//!
//! Short-horizon momentum entries with tight fixed-percentage exits.

mod config;
mod strategy;

pub use config::ScalpingConfig;
pub use strategy::ScalpingStrategy;

use super::{StrategiesConfig, Strategy};

/// Create strategy from config (called by the factory table)
pub fn create(config: &StrategiesConfig, balance: f64) -> Box<dyn Strategy> {
    Box::new(ScalpingStrategy::new(config.scalping.clone(), balance))
}
