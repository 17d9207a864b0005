//! Trend Following Configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFollowingConfig {
    /// Fast EMA period (default: 12)
    pub ema_fast: usize,

    /// Slow EMA period (default: 26)
    pub ema_slow: usize,

    /// MACD periods (default: 12/26/9)
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    /// ADX period (default: 14)
    pub adx_period: usize,

    /// Minimum ADX for a trend to count (default: 25)
    pub adx_threshold: f64,

    /// ATR period (default: 14)
    pub atr_period: usize,

    /// Stop distance in ATRs; the target sits at twice this (default: 2.0)
    pub atr_multiplier: f64,

    /// Lookback for breakout highs/lows (default: 20)
    pub breakout_period: usize,

    /// Volume spike multiple over the average (default: 1.5)
    pub volume_spike: f64,
}

impl Default for TrendFollowingConfig {
    fn default() -> Self {
        Self {
            ema_fast: 12,
            ema_slow: 26,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            adx_period: 14,
            adx_threshold: 25.0,
            atr_period: 14,
            atr_multiplier: 2.0,
            breakout_period: 20,
            volume_spike: 1.5,
        }
    }
}

impl TrendFollowingConfig {
    pub fn with_adx_threshold(mut self, threshold: f64) -> Self {
        self.adx_threshold = threshold;
        self
    }

    pub fn with_atr_multiplier(mut self, multiplier: f64) -> Self {
        self.atr_multiplier = multiplier;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ema_fast == 0 || self.ema_fast >= self.ema_slow {
            return Err(ConfigError::Inconsistent {
                section: "trend_following",
                message: format!(
                    "ema_fast ({}) must be non-zero and below ema_slow ({})",
                    self.ema_fast, self.ema_slow
                ),
            });
        }
        if self.macd_fast == 0 || self.macd_fast >= self.macd_slow || self.macd_signal == 0 {
            return Err(ConfigError::Inconsistent {
                section: "trend_following",
                message: "MACD periods must satisfy 0 < fast < slow and signal > 0".to_string(),
            });
        }
        ConfigError::check_positive("trend_following", "adx_period", self.adx_period as f64)?;
        ConfigError::check_positive("trend_following", "atr_period", self.atr_period as f64)?;
        ConfigError::check_positive("trend_following", "atr_multiplier", self.atr_multiplier)?;
        ConfigError::check_positive(
            "trend_following",
            "breakout_period",
            self.breakout_period as f64,
        )?;
        ConfigError::check_range("trend_following", "adx_threshold", self.adx_threshold, 0.0, 100.0)?;
        Ok(())
    }
}
