//! Mean Reversion Configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    /// RSI period (default: 14)
    pub rsi_period: usize,

    /// RSI at or below this is oversold (default: 30)
    pub rsi_oversold: f64,

    /// RSI at or above this is overbought (default: 70)
    pub rsi_overbought: f64,

    /// Bollinger period (default: 20)
    pub bb_period: usize,

    /// Bollinger width in standard deviations (default: 2.0)
    pub bb_std: f64,

    /// ATR period for the stop (default: 14)
    pub atr_period: usize,

    /// Stop distance in ATRs (default: 1.5)
    pub stop_atr: f64,

    /// Window for the average volume and realized range (default: 20)
    pub lookback: usize,

    /// Realized high-low range below this fraction counts as quiet (default: 0.05)
    pub low_range_pct: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            bb_period: 20,
            bb_std: 2.0,
            atr_period: 14,
            stop_atr: 1.5,
            lookback: 20,
            low_range_pct: 0.05,
        }
    }
}

impl MeanReversionConfig {
    pub fn with_rsi_levels(mut self, oversold: f64, overbought: f64) -> Self {
        self.rsi_oversold = oversold;
        self.rsi_overbought = overbought;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("mean_reversion", "rsi_period", self.rsi_period as f64)?;
        ConfigError::check_positive("mean_reversion", "bb_period", self.bb_period as f64)?;
        ConfigError::check_positive("mean_reversion", "bb_std", self.bb_std)?;
        ConfigError::check_positive("mean_reversion", "atr_period", self.atr_period as f64)?;
        ConfigError::check_positive("mean_reversion", "stop_atr", self.stop_atr)?;
        ConfigError::check_positive("mean_reversion", "lookback", self.lookback as f64)?;
        if !(0.0..self.rsi_overbought).contains(&self.rsi_oversold) || self.rsi_overbought > 100.0
        {
            return Err(ConfigError::Inconsistent {
                section: "mean_reversion",
                message: format!(
                    "RSI levels must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
                    self.rsi_oversold, self.rsi_overbought
                ),
            });
        }
        Ok(())
    }
}
