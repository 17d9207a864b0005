//! Scalping Strategy
//!
//! Entry:
//! - Long: close above EMA(9), RSI(7) inside the safe zone, 3-bar momentum ≥ min
//! - Short: close below EMA(9), RSI(7) inside the safe zone, momentum ≤ −min
//!
//! Preconditions: spread ≤ max_spread, last volume ≥ min_volume and at least
//! `min_interval_secs` of candle time since the previous emitted entry.
//! Exits are fixed fractions of entry; size risks 1% of balance at the stop.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::indicators::{ema_last, rsi_last};
use crate::strategies::{ensure_history, risk_sized_quantity, Strategy, StrategyId};
use crate::{Candle, CandleSeries, MarketSnapshot, Signal, SignalAction};

use super::config::ScalpingConfig;

const BASE_CONFIDENCE: f64 = 60.0;
const MAX_MOMENTUM_BONUS: f64 = 20.0;
const TIGHT_SPREAD_BONUS: f64 = 10.0;
const MAX_CONFIDENCE: f64 = 90.0;

pub struct ScalpingStrategy {
    config: ScalpingConfig,
    balance: f64,
    last_signal_at: Option<DateTime<Utc>>,
}

impl ScalpingStrategy {
    pub fn new(config: ScalpingConfig, balance: f64) -> Self {
        Self {
            config,
            balance,
            last_signal_at: None,
        }
    }

    fn rate_limited(&self, now: DateTime<Utc>) -> bool {
        self.last_signal_at
            .is_some_and(|last| now - last < Duration::seconds(self.config.min_interval_secs))
    }

    fn momentum(&self, closes: &[f64]) -> f64 {
        let n = closes.len();
        let base = closes[n - 1 - self.config.momentum_bars];
        if base > 0.0 {
            (closes[n - 1] - base) / base
        } else {
            0.0
        }
    }
}

impl Strategy for ScalpingStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Scalping
    }

    fn min_candles(&self) -> usize {
        self.config
            .ema_period
            .max(self.config.rsi_period + 1)
            .max(self.config.momentum_bars + 1)
    }

    fn analyze(&mut self, candles: &[Candle], snapshot: Option<&MarketSnapshot>) -> Signal {
        let id = self.id();
        let price = match ensure_history(id, candles, self.min_candles()) {
            Ok(price) => price,
            Err(hold) => return hold,
        };
        let last = &candles[candles.len() - 1];

        if self.rate_limited(last.datetime) {
            return Signal::hold(
                id,
                price,
                format!(
                    "Rate limited: less than {}s since last signal",
                    self.config.min_interval_secs
                ),
            );
        }

        let Some(snapshot) = snapshot else {
            return Signal::hold(id, price, "Order book snapshot required for spread check");
        };
        let spread = snapshot.spread_pct();
        if spread > self.config.max_spread {
            return Signal::hold(
                id,
                price,
                format!(
                    "Spread {:.3}% above max {:.3}%",
                    spread * 100.0,
                    self.config.max_spread * 100.0
                ),
            );
        }
        if last.volume < self.config.min_volume {
            return Signal::hold(
                id,
                price,
                format!("Volume {:.2} below minimum {:.2}", last.volume, self.config.min_volume),
            );
        }

        let closes = candles.closes();
        let Some(ema) = ema_last(&closes, self.config.ema_period) else {
            return Signal::hold(id, price, "EMA not available");
        };
        let rsi = rsi_last(&closes, self.config.rsi_period);
        let momentum = self.momentum(&closes);
        let rsi_safe = rsi >= self.config.rsi_lower && rsi <= self.config.rsi_upper;

        debug!(ema, rsi, momentum, spread, "scalping analysis");

        let long = price > ema && rsi_safe && momentum >= self.config.min_momentum;
        let short = price < ema && rsi_safe && momentum <= -self.config.min_momentum;
        if !long && !short {
            return Signal::hold(
                id,
                price,
                format!(
                    "No setup: price {:.2} vs EMA {:.2}, RSI {:.1}, momentum {:.3}%",
                    price,
                    ema,
                    rsi,
                    momentum * 100.0
                ),
            );
        }

        let (action, stop_loss, take_profit) = if long {
            (
                SignalAction::Buy,
                price * (1.0 - self.config.stop_loss),
                price * (1.0 + self.config.profit_target),
            )
        } else {
            (
                SignalAction::Sell,
                price * (1.0 + self.config.stop_loss),
                price * (1.0 - self.config.profit_target),
            )
        };

        let strength = momentum.abs() / self.config.min_momentum;
        let mut confidence = BASE_CONFIDENCE + ((strength - 1.0) * 5.0).clamp(0.0, MAX_MOMENTUM_BONUS);
        let mut reasons = vec![
            format!(
                "Price {:.2} {} EMA{} {:.2}",
                price,
                if long { "above" } else { "below" },
                self.config.ema_period,
                ema
            ),
            format!("RSI {:.1} in safe zone", rsi),
            format!("Momentum {:.3}%", momentum * 100.0),
        ];
        if spread <= self.config.max_spread / 2.0 {
            confidence += TIGHT_SPREAD_BONUS;
            reasons.push(format!("Tight spread {:.3}%", spread * 100.0));
        }

        // position notional capped at what the balance can pay for
        let quantity = risk_sized_quantity(
            self.balance,
            self.config.risk_per_trade,
            1.0,
            price,
            stop_loss,
        );

        self.last_signal_at = Some(last.datetime);

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

    fn reset(&mut self) {
        self.last_signal_at = None;
    }
}
