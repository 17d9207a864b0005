//! Trend Following Strategy
//!
//! Entry:
//! - Long: EMA(fast) > EMA(slow), MACD histogram > 0, ADX > threshold
//! - Short: the mirror image
//!
//! Confidence starts at 40 for the aligned trend and grows with MACD
//! momentum (+20), a breakout of the prior N-bar extreme (+20) and a volume
//! spike (+15), capped at 95.
//!
//! Exit levels: stop at ATR × multiplier, target at ATR × 2 × multiplier.

use tracing::debug;

use crate::indicators::{adx_last, atr_last, ema_last, highest, lowest, macd_last, trailing_mean};
use crate::strategies::{ensure_history, SizingConfig, Strategy, StrategyId};
use crate::{Candle, CandleSeries, MarketSnapshot, Signal, SignalAction};

use super::config::TrendFollowingConfig;

const TREND_CONFIDENCE: f64 = 40.0;
const MACD_BONUS: f64 = 20.0;
const BREAKOUT_BONUS: f64 = 20.0;
const VOLUME_BONUS: f64 = 15.0;
const MAX_CONFIDENCE: f64 = 95.0;

pub struct TrendFollowingStrategy {
    config: TrendFollowingConfig,
    sizing: SizingConfig,
    balance: f64,
}

impl TrendFollowingStrategy {
    pub fn new(config: TrendFollowingConfig, sizing: SizingConfig, balance: f64) -> Self {
        Self {
            config,
            sizing,
            balance,
        }
    }

    pub fn config(&self) -> &TrendFollowingConfig {
        &self.config
    }

    /// Did the last close break the extreme of the preceding `breakout_period` bars?
    fn breakout(&self, candles: &[Candle], long: bool) -> bool {
        let n = candles.len();
        if n < 2 {
            return false;
        }
        let prior = &candles[..n - 1];
        let close = candles[n - 1].close;
        if long {
            highest(&prior.highs(), self.config.breakout_period).is_some_and(|h| close > h)
        } else {
            lowest(&prior.lows(), self.config.breakout_period).is_some_and(|l| close < l)
        }
    }

    fn volume_spike(&self, candles: &[Candle]) -> bool {
        let n = candles.len();
        if n < 2 {
            return false;
        }
        let volumes = candles[..n - 1].volumes();
        let avg = trailing_mean(&volumes, self.config.breakout_period);
        avg > 0.0 && candles[n - 1].volume > avg * self.config.volume_spike
    }
}

impl Strategy for TrendFollowingStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::TrendFollowing
    }

    fn min_candles(&self) -> usize {
        let c = &self.config;
        (c.ema_slow)
            .max(c.macd_slow + c.macd_signal)
            .max(c.adx_period + 1)
            .max(c.atr_period + 1)
            .max(c.breakout_period + 1)
    }

    fn analyze(&mut self, candles: &[Candle], _snapshot: Option<&MarketSnapshot>) -> Signal {
        let id = self.id();
        let price = match ensure_history(id, candles, self.min_candles()) {
            Ok(price) => price,
            Err(hold) => return hold,
        };

        let closes = candles.closes();
        let highs = candles.highs();
        let lows = candles.lows();

        let (fast, slow) = match (
            ema_last(&closes, self.config.ema_fast),
            ema_last(&closes, self.config.ema_slow),
        ) {
            (Some(f), Some(s)) => (f, s),
            _ => return Signal::hold(id, price, "EMAs not available"),
        };
        let macd = match macd_last(
            &closes,
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        ) {
            Some(m) => m,
            None => return Signal::hold(id, price, "MACD not available"),
        };
        let adx = adx_last(&highs, &lows, &closes, self.config.adx_period);
        let atr = atr_last(&highs, &lows, &closes, self.config.atr_period);

        if atr <= 0.0 {
            return Signal::hold(id, price, "ATR is zero, cannot place stops");
        }

        let strong = adx > self.config.adx_threshold;
        let long = fast > slow && macd.histogram > 0.0 && strong;
        let short = fast < slow && macd.histogram < 0.0 && strong;

        debug!(
            fast_ema = fast,
            slow_ema = slow,
            histogram = macd.histogram,
            adx,
            "trend following analysis"
        );

        if !long && !short {
            let reason = if !strong {
                format!(
                    "ADX {:.1} below threshold {:.1}",
                    adx, self.config.adx_threshold
                )
            } else {
                "EMA and MACD disagree on direction".to_string()
            };
            return Signal::hold(id, price, reason);
        }

        let mut confidence = TREND_CONFIDENCE;
        let mut reasons = vec![format!(
            "{} trend: EMA{} {:.2} vs EMA{} {:.2}, ADX {:.1}",
            if long { "Up" } else { "Down" },
            self.config.ema_fast,
            fast,
            self.config.ema_slow,
            slow,
            adx
        )];

        confidence += MACD_BONUS;
        reasons.push(format!("MACD histogram {:.4} confirms", macd.histogram));

        if self.breakout(candles, long) {
            confidence += BREAKOUT_BONUS;
            reasons.push(format!(
                "Breakout of {}-bar {}",
                self.config.breakout_period,
                if long { "high" } else { "low" }
            ));
        }

        if self.volume_spike(candles) {
            confidence += VOLUME_BONUS;
            reasons.push("Volume spike".to_string());
        }

        let risk = atr * self.config.atr_multiplier;
        let (action, stop_loss, take_profit) = if long {
            (SignalAction::Buy, price - risk, price + 2.0 * risk)
        } else {
            (SignalAction::Sell, price + risk, price - 2.0 * risk)
        };
        let quantity = self.sizing.quantity(self.balance, price, stop_loss);

        Signal::directional(
            id,
            action,
            confidence.min(MAX_CONFIDENCE),
            price,
            stop_loss,
            take_profit,
            quantity,
            reasons,
        )
    }

    fn set_balance(&mut self, balance: f64) {
        self.balance = balance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64], volume: impl Fn(usize) -> f64) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new(
                    start + Duration::hours(i as i64),
                    c,
                    c * 1.004,
                    c * 0.997,
                    c,
                    volume(i),
                )
                .unwrap()
            })
            .collect()
    }

    fn strategy() -> TrendFollowingStrategy {
        TrendFollowingStrategy::new(
            TrendFollowingConfig::default(),
            SizingConfig::default(),
            10_000.0,
        )
    }

    #[test]
    fn test_short_window_holds() {
        let candles = series(&[100.0; 10], |_| 1000.0);
        let signal = strategy().analyze(&candles, None);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(signal.reasons[0].contains("Insufficient data"));
    }

    #[test]
    fn test_uptrend_buys_with_atr_levels() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let candles = series(&closes, |i| if i == 79 { 5000.0 } else { 1000.0 });
        let signal = strategy().analyze(&candles, None);

        assert_eq!(signal.action, SignalAction::Buy);
        assert_relative_eq!(signal.confidence, 95.0);
        assert!(signal.stop_loss < signal.entry_price);
        let risk = signal.entry_price - signal.stop_loss;
        assert_relative_eq!(signal.take_profit - signal.entry_price, 2.0 * risk, epsilon = 1e-9);
        assert!(signal.quantity > 0.0);
        assert!(signal.quantity * signal.entry_price <= 10_000.0 * 0.25 + 1e-9);
    }

    #[test]
    fn test_downtrend_sells() {
        let closes: Vec<f64> = (0..80).map(|i| 200.0 - i as f64).collect();
        let candles = series(&closes, |_| 1000.0);
        let signal = strategy().analyze(&candles, None);

        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.stop_loss > signal.entry_price);
        assert!(signal.take_profit < signal.entry_price);
        assert!(signal.confidence >= 60.0 && signal.confidence <= 95.0);
    }

    #[test]
    fn test_flat_market_holds() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let candles = series(&closes, |_| 1000.0);
        let signal = strategy().analyze(&candles, None);
        assert_eq!(signal.action, SignalAction::Hold);
    }
}
