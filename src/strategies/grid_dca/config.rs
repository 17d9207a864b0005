//! Grid DCA Configuration
//!
//! All `*_percent` / `*_pct` values are expressed in percent (10.0 = 10%).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridDcaConfig {
    /// Ladder depth below the reference price (default: 10)
    pub grid_range: f64,

    /// Spacing between levels (default: 1)
    pub grid_step: f64,

    /// Cap on cumulative bought notional, percent of balance (default: 20)
    pub max_exposure: f64,

    /// Notional of the first level, percent of balance (default: 2)
    pub base_order_pct: f64,

    /// Size growth per level: level n buys base × multiplier^(n−1) (default: 1.5)
    pub dca_multiplier: f64,

    /// Drop from the reference price that liquidates the grid (default: 10)
    pub stop_loss_percent: f64,

    /// Gain over the average entry that sells the position (default: 1.5)
    pub take_profit_percent: f64,
}

impl Default for GridDcaConfig {
    fn default() -> Self {
        Self {
            grid_range: 10.0,
            grid_step: 1.0,
            max_exposure: 20.0,
            base_order_pct: 2.0,
            dca_multiplier: 1.5,
            stop_loss_percent: 10.0,
            take_profit_percent: 1.5,
        }
    }
}

impl GridDcaConfig {
    pub fn with_grid(mut self, range: f64, step: f64) -> Self {
        self.grid_range = range;
        self.grid_step = step;
        self
    }

    pub fn with_max_exposure(mut self, max_exposure: f64) -> Self {
        self.max_exposure = max_exposure;
        self
    }

    pub fn with_stop_loss_percent(mut self, percent: f64) -> Self {
        self.stop_loss_percent = percent;
        self
    }

    /// Number of buy levels in the ladder
    pub fn level_count(&self) -> usize {
        if self.grid_step <= 0.0 {
            return 0;
        }
        // tolerate float noise such as 10.0 / 0.1
        ((self.grid_range / self.grid_step) + 1e-9).floor() as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range("grid_dca", "grid_range", self.grid_range, f64::EPSILON, 99.0)?;
        ConfigError::check_positive("grid_dca", "grid_step", self.grid_step)?;
        ConfigError::check_range("grid_dca", "max_exposure", self.max_exposure, 0.0, 100.0)?;
        ConfigError::check_positive("grid_dca", "base_order_pct", self.base_order_pct)?;
        ConfigError::check_range("grid_dca", "dca_multiplier", self.dca_multiplier, 1.0, 10.0)?;
        ConfigError::check_positive("grid_dca", "stop_loss_percent", self.stop_loss_percent)?;
        ConfigError::check_positive("grid_dca", "take_profit_percent", self.take_profit_percent)?;
        if self.grid_step > self.grid_range {
            return Err(ConfigError::Inconsistent {
                section: "grid_dca",
                message: format!(
                    "grid_step ({}) larger than grid_range ({})",
                    self.grid_step, self.grid_range
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_count() {
        assert_eq!(GridDcaConfig::default().level_count(), 10);
        assert_eq!(GridDcaConfig::default().with_grid(10.0, 0.1).level_count(), 100);
        assert_eq!(GridDcaConfig::default().with_grid(5.0, 2.0).level_count(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(GridDcaConfig::default().validate().is_ok());
        assert!(GridDcaConfig::default().with_grid(1.0, 2.0).validate().is_err());
        assert!(GridDcaConfig::default().with_max_exposure(150.0).validate().is_err());
    }
}
