//! Mean Reversion Strategy
//!
//! Fades stretched moves back toward the Bollinger middle band.

mod config;
mod strategy;

pub use config::MeanReversionConfig;
pub use strategy::MeanReversionStrategy;

use super::{StrategiesConfig, Strategy};

/// Create strategy from config (called by the factory table)
pub fn create(config: &StrategiesConfig, balance: f64) -> Box<dyn Strategy> {
    Box::new(MeanReversionStrategy::new(
        config.mean_reversion.clone(),
        config.sizing.clone(),
        balance,
    ))
}
