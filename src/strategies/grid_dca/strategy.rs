//! Grid DCA Strategy
//!
//! Lifecycle is explicit: [`GridDcaStrategy::initialize`] anchors the ladder at
//! a reference price, [`Strategy::reset`] drops it. An uninitialized grid only
//! ever returns HOLD; the selector initializes it through `activate` when it
//! switches to this strategy.
//!
//! Each analysis performs at most one action, checked in this order:
//! 1. drop from reference ≥ stop_loss_percent → CLOSE_ALL, re-anchor
//! 2. price ≥ average entry × (1 + take_profit_percent) → SELL all, re-anchor
//! 3. nearest unfilled level at or above price → BUY if exposure allows
//! 4. flat and above the ladder's top → re-anchor upward
//!
//! A BUY does not touch the ladder. Levels, exposure and position only change
//! when the fill comes back through [`Strategy::on_fill`], so a BUY the risk
//! gate blocks or the venue rejects leaves no inventory behind.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::strategies::{ensure_history, Strategy, StrategyId};
use crate::{Candle, CandleSeries, MarketSnapshot, Side, Signal, SignalAction, SignalDetail};

use super::config::GridDcaConfig;

const BUY_CONFIDENCE: f64 = 65.0;
const TAKE_PROFIT_CONFIDENCE: f64 = 80.0;
const STOP_CONFIDENCE: f64 = 90.0;

/// One rung of the ladder. `index` is 1-based: level 1 is closest to the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub index: usize,
    pub price: f64,
    pub filled: bool,
}

/// Persistent grid state owned by the strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridState {
    pub reference_price: f64,
    pub levels: Vec<GridLevel>,
    /// Cumulative bought notional (quote units)
    pub exposure: f64,
    /// Base units held
    pub position: f64,
    /// Quote spent on the position
    pub cost_basis: f64,
    /// Balance when the ladder was anchored; the exposure cap is a share of it
    pub budget: f64,
}

impl GridState {
    fn new(reference_price: f64, budget: f64, config: &GridDcaConfig) -> Self {
        let levels = (1..=config.level_count())
            .map(|index| GridLevel {
                index,
                price: reference_price * (1.0 - index as f64 * config.grid_step / 100.0),
                filled: false,
            })
            .collect();
        Self {
            reference_price,
            levels,
            exposure: 0.0,
            position: 0.0,
            cost_basis: 0.0,
            budget,
        }
    }

    pub fn average_entry(&self) -> Option<f64> {
        (self.position > 0.0).then(|| self.cost_basis / self.position)
    }

    pub fn filled_levels(&self) -> usize {
        self.levels.iter().filter(|l| l.filled).count()
    }

    /// Lowest-priced unfilled level still at or above `price`
    fn nearest_open_level(&self, price: f64) -> Option<usize> {
        self.levels
            .iter()
            .filter(|l| !l.filled && l.price >= price)
            .min_by(|a, b| a.price.total_cmp(&b.price))
            .map(|l| l.index)
    }

    fn buy_filled(&mut self, level: Option<usize>, exposure: f64, quantity: f64, price: f64) {
        if let Some(l) = level.and_then(|i| self.levels.iter_mut().find(|l| l.index == i)) {
            l.filled = true;
        }
        self.exposure += exposure;
        self.position += quantity;
        self.cost_basis += quantity * price;
    }

    /// Shrink position, cost and exposure pro rata; filled levels stay used
    fn sell_filled(&mut self, quantity: f64) {
        if self.position <= 0.0 {
            return;
        }
        let keep = 1.0 - (quantity / self.position).min(1.0);
        self.position *= keep;
        self.cost_basis *= keep;
        self.exposure *= keep;
    }
}

/// BUY emitted by the last analysis, waiting for its fill
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingBuy {
    level: usize,
    notional: f64,
    quantity: f64,
}

pub struct GridDcaStrategy {
    config: GridDcaConfig,
    balance: f64,
    state: Option<GridState>,
    pending: Option<PendingBuy>,
}

impl GridDcaStrategy {
    pub fn new(config: GridDcaConfig, balance: f64) -> Self {
        Self {
            config,
            balance,
            state: None,
            pending: None,
        }
    }

    /// Anchor a fresh ladder at `price`, discarding any previous state
    pub fn initialize(&mut self, price: f64) {
        info!(reference = price, levels = self.config.level_count(), "grid initialized");
        self.state = Some(GridState::new(price, self.balance, &self.config));
        self.pending = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&GridState> {
        self.state.as_ref()
    }

    /// Cumulative exposure as percent of the balance the ladder was anchored with
    pub fn exposure_pct(&self) -> f64 {
        match &self.state {
            Some(state) if state.budget > 0.0 => state.exposure / state.budget * 100.0,
            _ => 0.0,
        }
    }

    /// Quote notional bought at ladder level `index` (1-based)
    pub fn level_notional(&self, index: usize) -> f64 {
        let exponent = index.saturating_sub(1) as i32;
        self.balance * self.config.base_order_pct / 100.0 * self.config.dca_multiplier.powi(exponent)
    }

    fn stop_price(&self, reference: f64) -> f64 {
        reference * (1.0 - self.config.stop_loss_percent / 100.0)
    }

    fn analyze_price(&mut self, price: f64) -> Signal {
        let id = StrategyId::GridDca;
        self.pending = None;
        let Some(state) = self.state.as_ref() else {
            return Signal::hold(id, price, "Grid not initialized");
        };
        let reference = state.reference_price;

        // 1. Stop: liquidate on a deep drop from the reference
        let drawdown_pct = (reference - price) / reference * 100.0;
        if drawdown_pct >= self.config.stop_loss_percent {
            let quantity = state.position;
            info!(
                reference,
                price,
                drawdown_pct,
                quantity,
                "grid stop loss triggered, closing all"
            );
            let signal = Signal::directional(
                id,
                SignalAction::CloseAll,
                STOP_CONFIDENCE,
                price,
                price,
                price,
                quantity,
                vec![format!(
                    "Price {:.2} is {:.2}% below reference {:.2} (stop {:.1}%)",
                    price, drawdown_pct, reference, self.config.stop_loss_percent
                )],
            );
            self.initialize(price);
            return signal;
        }

        // 2. Take profit above the average entry
        if let Some(avg) = state.average_entry() {
            let target = avg * (1.0 + self.config.take_profit_percent / 100.0);
            if price >= target {
                let quantity = state.position;
                info!(avg_entry = avg, price, quantity, "grid take profit");
                let signal = Signal::directional(
                    id,
                    SignalAction::Sell,
                    TAKE_PROFIT_CONFIDENCE,
                    price,
                    self.stop_price(reference),
                    price,
                    quantity,
                    vec![format!(
                        "Price {:.2} reached take profit {:.2} over average entry {:.2}",
                        price, target, avg
                    )],
                );
                self.initialize(price);
                return signal;
            }
        }

        // 3. Buy the nearest open level. The ladder only moves on the fill.
        if let Some(index) = state.nearest_open_level(price) {
            let notional = self.level_notional(index);
            let limit = state.budget * self.config.max_exposure / 100.0;
            if state.exposure + notional > limit + 1e-9 {
                return Signal::hold(
                    id,
                    price,
                    format!(
                        "Level {} skipped: exposure {:.2} + {:.2} exceeds limit {:.2}",
                        index, state.exposure, notional, limit
                    ),
                );
            }

            let quantity = notional / price;
            let avg = (state.cost_basis + notional) / (state.position + quantity);
            let exposure_pct = if state.budget > 0.0 {
                (state.exposure + notional) / state.budget * 100.0
            } else {
                0.0
            };
            let level_price = reference * (1.0 - index as f64 * self.config.grid_step / 100.0);
            self.pending = Some(PendingBuy {
                level: index,
                notional,
                quantity,
            });

            debug!(level = index, price, notional, exposure_pct, "grid level reached");

            return Signal::directional(
                id,
                SignalAction::Buy,
                BUY_CONFIDENCE,
                price,
                self.stop_price(reference),
                avg * (1.0 + self.config.take_profit_percent / 100.0),
                quantity,
                vec![format!(
                    "Grid level {} ({:.2}) reached, exposure {:.2}% once filled",
                    index, level_price, exposure_pct
                )],
            )
            .with_detail(SignalDetail::Grid {
                level: index,
                exposure_pct,
            });
        }

        // 4. Trail the anchor upward while flat
        let top = reference * (1.0 + self.config.grid_range / 100.0);
        if state.position <= 0.0 && price > top {
            self.initialize(price);
            return Signal::hold(id, price, format!("Grid re-anchored at {:.2}", price));
        }

        Signal::hold(
            id,
            price,
            format!("No open grid level at or above {:.2}", price),
        )
    }
}

impl Strategy for GridDcaStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::GridDca
    }

    fn min_candles(&self) -> usize {
        1
    }

    fn analyze(&mut self, candles: &[Candle], _snapshot: Option<&MarketSnapshot>) -> Signal {
        match ensure_history(self.id(), candles, self.min_candles()) {
            Ok(price) => self.analyze_price(price),
            Err(hold) => hold,
        }
    }

    fn set_balance(&mut self, balance: f64) {
        self.balance = balance;
    }

    fn activate(&mut self, candles: &[Candle]) {
        if self.state.is_none() {
            if let Some(price) = candles.last_close() {
                self.initialize(price);
            }
        }
    }

    /// Commits ladder state. A BUY fill counts against the exposure cap at
    /// the level's planned notional, scaled by the filled share.
    fn on_fill(&mut self, side: Side, quantity: f64, price: f64) {
        let pending = self.pending.take();
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match side {
            Side::Buy => {
                let (level, exposure) = match pending {
                    Some(p) if p.quantity > 0.0 => {
                        (Some(p.level), p.notional * (quantity / p.quantity).min(1.0))
                    }
                    _ => (state.nearest_open_level(price), quantity * price),
                };
                state.buy_filled(level, exposure, quantity, price);
                debug!(?level, quantity, price, exposure = state.exposure, "grid buy filled");
            }
            Side::Sell => state.sell_filled(quantity),
        }
    }

    fn reset(&mut self) {
        self.state = None;
        self.pending = None;
    }
}
