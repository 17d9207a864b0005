//! Mean Reversion Strategy
//!
//! BUY when RSI is oversold or the bar touches the lower Bollinger band,
//! SELL on the overbought / upper band mirror. Target is the middle band,
//! stop is 1.5 ATR beyond entry.

use tracing::debug;

use crate::indicators::{atr_last, bollinger_last, highest, lowest, rsi_last, trailing_mean};
use crate::strategies::{ensure_history, SizingConfig, Strategy, StrategyId};
use crate::{Candle, CandleSeries, MarketSnapshot, Signal, SignalAction};

use super::config::MeanReversionConfig;

const BASE_CONFIDENCE: f64 = 50.0;
const AGREEMENT_BONUS: f64 = 15.0;
const VOLUME_BONUS: f64 = 15.0;
const LOW_RANGE_BONUS: f64 = 10.0;
const MAX_CONFIDENCE: f64 = 95.0;

pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
    sizing: SizingConfig,
    balance: f64,
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig, sizing: SizingConfig, balance: f64) -> Self {
        Self {
            config,
            sizing,
            balance,
        }
    }

    /// (high − low) / low over the lookback window
    fn realized_range(&self, candles: &[Candle]) -> Option<f64> {
        let hi = highest(&candles.highs(), self.config.lookback)?;
        let lo = lowest(&candles.lows(), self.config.lookback)?;
        (lo > 0.0).then(|| (hi - lo) / lo)
    }

    fn above_average_volume(&self, candles: &[Candle]) -> bool {
        let n = candles.len();
        if n < 2 {
            return false;
        }
        let avg = trailing_mean(&candles[..n - 1].volumes(), self.config.lookback);
        avg > 0.0 && candles[n - 1].volume > avg
    }
}

impl Strategy for MeanReversionStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::MeanReversion
    }

    fn min_candles(&self) -> usize {
        let c = &self.config;
        (c.rsi_period + 1)
            .max(c.bb_period)
            .max(c.atr_period + 1)
            .max(c.lookback + 1)
    }

    fn analyze(&mut self, candles: &[Candle], _snapshot: Option<&MarketSnapshot>) -> Signal {
        let id = self.id();
        let price = match ensure_history(id, candles, self.min_candles()) {
            Ok(price) => price,
            Err(hold) => return hold,
        };

        let closes = candles.closes();
        let rsi = rsi_last(&closes, self.config.rsi_period);
        let bands = match bollinger_last(&closes, self.config.bb_period, self.config.bb_std) {
            Some(b) => b,
            None => return Signal::hold(id, price, "Bollinger Bands not available"),
        };
        let atr = atr_last(
            &candles.highs(),
            &candles.lows(),
            &closes,
            self.config.atr_period,
        );
        let last = &candles[candles.len() - 1];

        let rsi_buy = rsi <= self.config.rsi_oversold;
        let rsi_sell = rsi >= self.config.rsi_overbought;
        let band_buy = last.low <= bands.lower;
        let band_sell = last.high >= bands.upper;

        debug!(rsi, upper = bands.upper, middle = bands.middle, lower = bands.lower, "mean reversion analysis");

        let long = rsi_buy || band_buy;
        let short = rsi_sell || band_sell;

        if long && short {
            return Signal::hold(id, price, "Conflicting oversold and overbought readings");
        }
        if !long && !short {
            return Signal::hold(
                id,
                price,
                format!(
                    "RSI {:.1} and price {:.2} inside bands [{:.2}, {:.2}]",
                    rsi, price, bands.lower, bands.upper
                ),
            );
        }
        if atr <= 0.0 {
            return Signal::hold(id, price, "ATR is zero, cannot place stops");
        }

        let (action, stop_loss, take_profit) = if long {
            (SignalAction::Buy, price - self.config.stop_atr * atr, bands.middle)
        } else {
            (SignalAction::Sell, price + self.config.stop_atr * atr, bands.middle)
        };

        let target_ok = if long {
            take_profit > price
        } else {
            take_profit < price
        };
        if !target_ok {
            return Signal::hold(
                id,
                price,
                format!("Price {:.2} already beyond middle band {:.2}", price, bands.middle),
            );
        }

        let mut confidence = BASE_CONFIDENCE;
        let mut reasons = Vec::new();
        if long {
            if rsi_buy {
                reasons.push(format!("RSI {:.1} oversold", rsi));
            }
            if band_buy {
                reasons.push(format!("Touched lower band {:.2}", bands.lower));
            }
            if rsi_buy && band_buy {
                confidence += AGREEMENT_BONUS;
            }
        } else {
            if rsi_sell {
                reasons.push(format!("RSI {:.1} overbought", rsi));
            }
            if band_sell {
                reasons.push(format!("Touched upper band {:.2}", bands.upper));
            }
            if rsi_sell && band_sell {
                confidence += AGREEMENT_BONUS;
            }
        }

        if self.above_average_volume(candles) {
            confidence += VOLUME_BONUS;
            reasons.push("Above-average volume".to_string());
        }

        if let Some(range) = self.realized_range(candles) {
            if range < self.config.low_range_pct {
                confidence += LOW_RANGE_BONUS;
                reasons.push(format!("Low realized range {:.2}%", range * 100.0));
            }
        }

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
