//! Market Making Configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakingConfig {
    /// Quoted spread around the reservation price, fraction of mid (default: 0.002)
    pub target_spread: f64,

    /// Market spread above which no quotes are posted (default: 0.005)
    pub max_spread: f64,

    /// Minimum quote notional resting in the top `depth_levels` (default: 10000)
    pub min_liquidity: f64,

    /// Book levels per side counted toward liquidity (default: 5)
    pub depth_levels: usize,

    /// |skew| above this triggers a rebalance instead of quoting (default: 0.8)
    pub skew_threshold: f64,

    /// Inventory (base units) that maps to skew ±1 (default: 1.0)
    pub max_inventory: f64,

    /// Quote size in base units (default: 0.1)
    pub order_size: f64,
}

impl Default for MarketMakingConfig {
    fn default() -> Self {
        Self {
            target_spread: 0.002,
            max_spread: 0.005,
            min_liquidity: 10_000.0,
            depth_levels: 5,
            skew_threshold: 0.8,
            max_inventory: 1.0,
            order_size: 0.1,
        }
    }
}

impl MarketMakingConfig {
    pub fn with_min_liquidity(mut self, min_liquidity: f64) -> Self {
        self.min_liquidity = min_liquidity;
        self
    }

    pub fn with_max_inventory(mut self, max_inventory: f64) -> Self {
        self.max_inventory = max_inventory;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("market_making", "target_spread", self.target_spread)?;
        ConfigError::check_positive("market_making", "max_spread", self.max_spread)?;
        ConfigError::check_range("market_making", "min_liquidity", self.min_liquidity, 0.0, f64::MAX)?;
        ConfigError::check_positive("market_making", "depth_levels", self.depth_levels as f64)?;
        ConfigError::check_range("market_making", "skew_threshold", self.skew_threshold, 0.0, 1.0)?;
        ConfigError::check_positive("market_making", "max_inventory", self.max_inventory)?;
        ConfigError::check_positive("market_making", "order_size", self.order_size)?;
        Ok(())
    }
}
