//! Market Making Strategy
//!
//! Not directional. Each cycle either:
//! - refuses to quote (book too thin or spread too wide),
//! - emits REBALANCE when |skew| exceeds the threshold, or
//! - computes bid/ask around a reservation price shifted against inventory and
//!   emits the side that reduces inventory: BUY at the bid (target ask) while
//!   flat or short, SELL at the ask (target bid) while long.
//!
//! `skew = inventory / max_inventory`, clamped to [−1, 1].

use tracing::{debug, info};

use crate::strategies::{ensure_history, Strategy, StrategyId};
use crate::{Candle, MarketSnapshot, Side, Signal, SignalAction, SignalDetail};

use super::config::MarketMakingConfig;

const BASE_CONFIDENCE: f64 = 60.0;
const SPREAD_BONUS: f64 = 20.0;
const DEEP_BOOK_BONUS: f64 = 10.0;
const REBALANCE_CONFIDENCE: f64 = 70.0;

/// Two-sided quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quotes {
    pub bid: f64,
    pub ask: f64,
    pub size: f64,
    pub skew: f64,
}

pub struct MarketMakingStrategy {
    config: MarketMakingConfig,
    inventory: f64,
}

impl MarketMakingStrategy {
    pub fn new(config: MarketMakingConfig) -> Self {
        Self {
            config,
            inventory: 0.0,
        }
    }

    pub fn inventory(&self) -> f64 {
        self.inventory
    }

    pub fn set_inventory(&mut self, inventory: f64) {
        self.inventory = inventory;
    }

    pub fn apply_fill(&mut self, side: Side, quantity: f64) {
        self.inventory += side.sign() * quantity;
        debug!(inventory = self.inventory, "market maker inventory updated");
    }

    pub fn skew(&self) -> f64 {
        (self.inventory / self.config.max_inventory).clamp(-1.0, 1.0)
    }

    /// Quotes around `mid`: the reservation price moves down by `skew × half_spread`
    /// so a long book sells more eagerly and buys less eagerly.
    pub fn quotes(&self, mid: f64) -> Quotes {
        let skew = self.skew();
        let half = self.config.target_spread / 2.0;
        let reservation = mid * (1.0 - skew * half);
        Quotes {
            bid: reservation * (1.0 - half),
            ask: reservation * (1.0 + half),
            size: self.config.order_size,
            skew,
        }
    }
}

impl Strategy for MarketMakingStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::MarketMaking
    }

    fn min_candles(&self) -> usize {
        1
    }

    fn analyze(&mut self, candles: &[Candle], snapshot: Option<&MarketSnapshot>) -> Signal {
        let id = self.id();
        let price = match ensure_history(id, candles, self.min_candles()) {
            Ok(price) => price,
            Err(hold) => return hold,
        };
        let Some(snapshot) = snapshot else {
            return Signal::hold(id, price, "Order book snapshot required to quote");
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
        let liquidity = snapshot.depth_notional(self.config.depth_levels);
        if liquidity < self.config.min_liquidity {
            return Signal::hold(
                id,
                price,
                format!(
                    "Book liquidity {:.0} below minimum {:.0}",
                    liquidity, self.config.min_liquidity
                ),
            );
        }

        let mid = snapshot.mid();
        let skew = self.skew();

        if skew.abs() > self.config.skew_threshold {
            let side = if skew > 0.0 { Side::Sell } else { Side::Buy };
            // bring inventory back to half the threshold
            let target = self.config.skew_threshold * self.config.max_inventory / 2.0;
            let quantity = (self.inventory.abs() - target).max(0.0);
            info!(skew, %side, quantity, "market maker rebalancing inventory");
            return Signal::directional(
                id,
                SignalAction::Rebalance,
                REBALANCE_CONFIDENCE,
                mid,
                mid,
                mid,
                quantity,
                vec![format!(
                    "Inventory skew {:.2} beyond threshold {:.2}",
                    skew, self.config.skew_threshold
                )],
            )
            .with_detail(SignalDetail::Rebalance { skew, side });
        }

        let quotes = self.quotes(mid);
        let mut confidence =
            BASE_CONFIDENCE + SPREAD_BONUS * (1.0 - spread / self.config.max_spread).max(0.0);
        let mut reasons = vec![format!(
            "Quoting {:.4} / {:.4} around mid {:.4}, skew {:.2}",
            quotes.bid, quotes.ask, mid, skew
        )];
        if liquidity >= 2.0 * self.config.min_liquidity {
            confidence += DEEP_BOOK_BONUS;
            reasons.push(format!("Deep book: {:.0} resting", liquidity));
        }

        let (action, entry, target, stop, quantity) = if skew > 0.0 {
            (
                SignalAction::Sell,
                quotes.ask,
                quotes.bid,
                quotes.ask * (1.0 + self.config.max_spread),
                quotes.size.min(self.inventory),
            )
        } else {
            let room = (self.config.max_inventory - self.inventory).max(0.0);
            (
                SignalAction::Buy,
                quotes.bid,
                quotes.ask,
                quotes.bid * (1.0 - self.config.max_spread),
                quotes.size.min(room),
            )
        };

        Signal::directional(id, action, confidence, entry, stop, target, quantity, reasons)
            .with_detail(SignalDetail::Quotes {
                bid: quotes.bid,
                ask: quotes.ask,
                size: quotes.size,
                skew,
            })
    }

    fn set_balance(&mut self, _balance: f64) {}

    fn on_fill(&mut self, side: Side, quantity: f64, _price: f64) {
        self.apply_fill(side, quantity);
    }

    fn reset(&mut self) {
        self.inventory = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BookLevel;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn candles() -> Vec<Candle> {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        vec![Candle::new(t, 100.0, 100.0, 100.0, 100.0, 10.0).unwrap()]
    }

    /// Five levels a side, `qty` each, 0.1% spread
    fn book(qty: f64) -> MarketSnapshot {
        let bids = (0..5).map(|i| BookLevel::new(99.95 - i as f64 * 0.05, qty)).collect();
        let asks = (0..5).map(|i| BookLevel::new(100.05 + i as f64 * 0.05, qty)).collect();
        MarketSnapshot::from_levels(bids, asks).unwrap()
    }

    #[test]
    fn test_flat_inventory_quotes_symmetric_and_buys() {
        let mut mm = MarketMakingStrategy::new(MarketMakingConfig::default());
        let signal = mm.analyze(&candles(), Some(&book(20.0)));

        assert_eq!(signal.action, SignalAction::Buy);
        match signal.detail {
            Some(SignalDetail::Quotes { bid, ask, skew, .. }) => {
                assert_relative_eq!(skew, 0.0);
                assert_relative_eq!((ask + bid) / 2.0, 100.0, epsilon = 1e-9);
                assert_relative_eq!((ask - bid) / 100.0, 0.002, epsilon = 1e-9);
                assert_relative_eq!(signal.entry_price, bid);
                assert_relative_eq!(signal.take_profit, ask);
            }
            other => panic!("expected quotes, got {:?}", other),
        }
        assert_relative_eq!(signal.quantity, 0.1);
    }

    #[test]
    fn test_long_inventory_skews_quotes_down_and_sells() {
        let mut mm = MarketMakingStrategy::new(MarketMakingConfig::default());
        mm.set_inventory(0.5);
        let flat = MarketMakingStrategy::new(MarketMakingConfig::default()).quotes(100.0);
        let skewed = mm.quotes(100.0);
        assert!(skewed.bid < flat.bid && skewed.ask < flat.ask);

        let signal = mm.analyze(&candles(), Some(&book(20.0)));
        assert_eq!(signal.action, SignalAction::Sell);
        assert_relative_eq!(signal.entry_price, skewed.ask);
    }

    #[test]
    fn test_excess_skew_rebalances() {
        let mut mm = MarketMakingStrategy::new(MarketMakingConfig::default());
        mm.apply_fill(Side::Sell, 0.9);
        let signal = mm.analyze(&candles(), Some(&book(20.0)));

        assert_eq!(signal.action, SignalAction::Rebalance);
        assert_eq!(
            signal.detail,
            Some(SignalDetail::Rebalance {
                skew: -0.9,
                side: Side::Buy
            })
        );
        assert_relative_eq!(signal.quantity, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_thin_book_refuses_to_quote() {
        let mut mm = MarketMakingStrategy::new(MarketMakingConfig::default());
        // 10 levels × 5 × ~100 = ~5000 < 10000
        let signal = mm.analyze(&candles(), Some(&book(5.0)));
        assert_eq!(signal.action, SignalAction::Hold);
        assert!(signal.reasons[0].contains("liquidity"));
    }

    #[test]
    fn test_missing_snapshot_holds() {
        let mut mm = MarketMakingStrategy::new(MarketMakingConfig::default());
        assert_eq!(mm.analyze(&candles(), None).action, SignalAction::Hold);
    }
}
