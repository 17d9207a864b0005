//! Market regime classification
//!
//! Turns a candle window into a [`MarketCondition`]:
//! - volatility = ATR(14) / mean close(20)
//! - trend strength = ADX(14) / 100
//! - liquidity = current volume / mean volume(20)
//!
//! The label comes from a fixed decision table, first match wins:
//!
//! | condition                                   | regime   | confidence |
//! |---------------------------------------------|----------|------------|
//! | liquidity < 0.5                             | ILLIQUID | 80         |
//! | ADX > 25 and volatility < 0.03              | TRENDING | 75         |
//! | ADX < 20 and volatility < 0.02              | RANGING  | 70         |
//! | volatility > 0.03                           | VOLATILE | 65         |
//! | otherwise                                   | RANGING  | 50         |

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::indicators::{adx_last, atr_last, trailing_mean};
use crate::{Candle, CandleSeries, MarketCondition, Regime};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Windows shorter than this classify as ILLIQUID with confidence 0 (default: 50)
    pub min_candles: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    /// Window for average close and average volume (default: 20)
    pub average_period: usize,
    pub illiquid_liquidity: f64,
    pub trending_adx: f64,
    pub trending_max_volatility: f64,
    pub ranging_adx: f64,
    pub ranging_max_volatility: f64,
    pub volatile_volatility: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            atr_period: 14,
            adx_period: 14,
            average_period: 20,
            illiquid_liquidity: 0.5,
            trending_adx: 25.0,
            trending_max_volatility: 0.03,
            ranging_adx: 20.0,
            ranging_max_volatility: 0.02,
            volatile_volatility: 0.03,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("regime", "atr_period", self.atr_period as f64)?;
        ConfigError::check_positive("regime", "adx_period", self.adx_period as f64)?;
        ConfigError::check_positive("regime", "average_period", self.average_period as f64)?;
        ConfigError::check_range("regime", "trending_adx", self.trending_adx, 0.0, 100.0)?;
        ConfigError::check_range("regime", "ranging_adx", self.ranging_adx, 0.0, 100.0)?;
        if self.min_candles < self.adx_period + 1 || self.min_candles < self.average_period {
            return Err(ConfigError::Inconsistent {
                section: "regime",
                message: format!(
                    "min_candles ({}) shorter than the indicator periods",
                    self.min_candles
                ),
            });
        }
        Ok(())
    }
}

/// Stateless classifier; same window in, same condition out
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn classify(&self, candles: &[Candle]) -> MarketCondition {
        if candles.len() < self.config.min_candles {
            return MarketCondition::insufficient();
        }

        let closes = candles.closes();
        let highs = candles.highs();
        let lows = candles.lows();
        let volumes = candles.volumes();

        let atr = atr_last(&highs, &lows, &closes, self.config.atr_period);
        let adx = adx_last(&highs, &lows, &closes, self.config.adx_period);
        let avg_close = trailing_mean(&closes, self.config.average_period);
        let avg_volume = trailing_mean(&volumes, self.config.average_period);
        let current_volume = volumes.last().copied().unwrap_or(0.0);

        let volatility = if avg_close > 0.0 { atr / avg_close } else { 0.0 };
        let liquidity = if avg_volume > 0.0 {
            current_volume / avg_volume
        } else {
            0.0
        };
        let trend_strength = (adx / 100.0).clamp(0.0, 1.0);

        let (regime, confidence) = self.label(volatility, adx, liquidity);

        MarketCondition {
            volatility,
            trend_strength,
            liquidity,
            regime,
            confidence,
        }
    }

    fn label(&self, volatility: f64, adx: f64, liquidity: f64) -> (Regime, f64) {
        let c = &self.config;
        if liquidity < c.illiquid_liquidity {
            (Regime::Illiquid, 80.0)
        } else if adx > c.trending_adx && volatility < c.trending_max_volatility {
            (Regime::Trending, 75.0)
        } else if adx < c.ranging_adx && volatility < c.ranging_max_volatility {
            (Regime::Ranging, 70.0)
        } else if volatility > c.volatile_volatility {
            (Regime::Volatile, 65.0)
        } else {
            (Regime::Ranging, 50.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn build(n: usize, f: impl Fn(usize) -> (f64, f64, f64, f64)) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let (close, high, low, volume) = f(i);
                Candle::new(start + Duration::hours(i as i64), close, high, low, close, volume)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_short_window_is_illiquid_zero_confidence() {
        let candles = build(49, |_| (100.0, 100.5, 99.5, 1000.0));
        let condition = RegimeClassifier::default().classify(&candles);
        assert_eq!(condition.regime, Regime::Illiquid);
        assert_eq!(condition.confidence, 0.0);
    }

    #[test]
    fn test_volume_drought_is_illiquid() {
        let candles = build(60, |i| {
            let v = if i == 59 { 100.0 } else { 1000.0 };
            (100.0, 100.5, 99.5, v)
        });
        let condition = RegimeClassifier::default().classify(&candles);
        assert_eq!(condition.regime, Regime::Illiquid);
        assert_eq!(condition.confidence, 80.0);
    }

    #[test]
    fn test_steady_climb_is_trending() {
        let candles = build(60, |i| {
            let c = 100.0 + i as f64 * 0.5;
            (c, c + 0.3, c - 0.2, 1000.0)
        });
        let condition = RegimeClassifier::default().classify(&candles);
        assert_eq!(condition.regime, Regime::Trending);
        assert_eq!(condition.confidence, 75.0);
        assert!(condition.trend_strength > 0.25);
    }

    #[test]
    fn test_tight_chop_is_ranging() {
        let candles = build(60, |i| {
            let c = if i % 2 == 0 { 100.2 } else { 99.8 };
            (c, c + 0.1, c - 0.1, 1000.0)
        });
        let condition = RegimeClassifier::default().classify(&candles);
        assert_eq!(condition.regime, Regime::Ranging);
        assert_eq!(condition.confidence, 70.0);
        assert!(condition.volatility < 0.01);
    }

    #[test]
    fn test_wild_swings_are_volatile() {
        let candles = build(60, |i| {
            let c = if i % 2 == 0 { 106.0 } else { 94.0 };
            (c, c + 3.0, c - 3.0, 1000.0)
        });
        let condition = RegimeClassifier::default().classify(&candles);
        assert_eq!(condition.regime, Regime::Volatile);
        assert_eq!(condition.confidence, 65.0);
    }

    #[test]
    fn test_classification_is_pure() {
        let candles = build(80, |i| {
            let c = 100.0 + (i as f64 * 0.7).sin() * 3.0;
            (c, c + 1.0, c - 1.0, 1000.0 + i as f64)
        });
        let classifier = RegimeClassifier::default();
        assert_eq!(classifier.classify(&candles), classifier.classify(&candles));
    }
}
