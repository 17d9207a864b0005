//! Grid DCA Strategy
//!
//! Buys a ladder of levels below a reference price with geometrically growing
//! size, takes profit above the average entry and liquidates on a deep drop.
//! The only generator carrying state between calls.

mod config;
mod strategy;

pub use config::GridDcaConfig;
pub use strategy::{GridDcaStrategy, GridLevel, GridState};

use super::{StrategiesConfig, Strategy};

/// Create strategy from config (called by the factory table)
pub fn create(config: &StrategiesConfig, balance: f64) -> Box<dyn Strategy> {
    Box::new(GridDcaStrategy::new(config.grid_dca.clone(), balance))
}
