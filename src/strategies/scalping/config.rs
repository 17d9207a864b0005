//! Scalping Configuration
//!
//! Rates are fractions (0.001 = 0.1%).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpingConfig {
    /// Minimum seconds between emitted BUY/SELL signals, measured in candle time (default: 60)
    pub min_interval_secs: i64,

    /// EMA period for the price filter (default: 9)
    pub ema_period: usize,

    /// RSI period (default: 7)
    pub rsi_period: usize,

    /// RSI safe zone; entries only while RSI is inside it (default: 35..65)
    pub rsi_lower: f64,
    pub rsi_upper: f64,

    /// Bars over which momentum is measured (default: 3)
    pub momentum_bars: usize,

    /// Minimum absolute momentum (default: 0.001)
    pub min_momentum: f64,

    /// Maximum bid/ask spread relative to mid (default: 0.001)
    pub max_spread: f64,

    /// Minimum volume of the last candle (default: 0)
    pub min_volume: f64,

    /// Profit target distance (default: 0.004)
    pub profit_target: f64,

    /// Stop distance (default: 0.0025)
    pub stop_loss: f64,

    /// Fraction of balance risked between entry and stop (default: 0.01)
    pub risk_per_trade: f64,
}

impl Default for ScalpingConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 60,
            ema_period: 9,
            rsi_period: 7,
            rsi_lower: 35.0,
            rsi_upper: 65.0,
            momentum_bars: 3,
            min_momentum: 0.001,
            max_spread: 0.001,
            min_volume: 0.0,
            profit_target: 0.004,
            stop_loss: 0.0025,
            risk_per_trade: 0.01,
        }
    }
}

impl ScalpingConfig {
    pub fn with_min_interval_secs(mut self, secs: i64) -> Self {
        self.min_interval_secs = secs;
        self
    }

    pub fn with_max_spread(mut self, max_spread: f64) -> Self {
        self.max_spread = max_spread;
        self
    }

    pub fn with_min_volume(mut self, min_volume: f64) -> Self {
        self.min_volume = min_volume;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range(
            "scalping",
            "min_interval_secs",
            self.min_interval_secs as f64,
            0.0,
            f64::MAX,
        )?;
        ConfigError::check_positive("scalping", "ema_period", self.ema_period as f64)?;
        ConfigError::check_positive("scalping", "rsi_period", self.rsi_period as f64)?;
        ConfigError::check_positive("scalping", "momentum_bars", self.momentum_bars as f64)?;
        ConfigError::check_positive("scalping", "max_spread", self.max_spread)?;
        ConfigError::check_positive("scalping", "profit_target", self.profit_target)?;
        ConfigError::check_positive("scalping", "stop_loss", self.stop_loss)?;
        ConfigError::check_range("scalping", "risk_per_trade", self.risk_per_trade, 0.0, 1.0)?;
        if self.rsi_lower >= self.rsi_upper {
            return Err(ConfigError::Inconsistent {
                section: "scalping",
                message: format!(
                    "rsi_lower ({}) must be below rsi_upper ({})",
                    self.rsi_lower, self.rsi_upper
                ),
            });
        }
        Ok(())
    }
}
