//! Execution simulator
//!
//! Fills orders against a [`MarketSnapshot`] with fees, directional slippage,
//! random early stops (partial fills) and optional artificial latency. All
//! randomness comes from one seeded `StdRng`, so a simulator built with the
//! same seed replays identically.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::account::PaperAccount;
use super::book::BookConfig;
use super::order::{Fill, Order, OrderRequest, OrderType, RejectReason};
use crate::error::ConfigError;
use crate::{MarketSnapshot, Side};

/// Size impact is order value divided by this
const SIZE_IMPACT_DIVISOR: f64 = 1_000_000.0;

/// Execution model parameters
///
/// Rates are fractions (`0.001` = 0.1%).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Taker fee on executed notional (default: 0.001)
    pub fee_rate: f64,
    /// Slippage applied to every fill (default: 0.0005)
    pub base_slippage: f64,
    /// Cap on the size component, value / 1,000,000 (default: 0.001)
    pub size_impact_cap: f64,
    /// Multiplier on the quoted spread fraction (default: 0.5)
    pub spread_impact: f64,
    /// Hard ceiling on per-fill slippage (default: 0.005)
    pub max_slippage: f64,
    /// Chance of stopping after each consumed level (default: 0.05)
    pub partial_fill_probability: f64,
    /// Orders below this quote notional are rejected (default: 10)
    pub min_order_notional: f64,
    /// Sleep a sampled latency before executing (default: false)
    pub simulate_latency: bool,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    /// RNG seed (default: 42)
    pub seed: u64,
    /// Books generated by the engine in simulation mode
    pub book: BookConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            base_slippage: 0.0005,
            size_impact_cap: 0.001,
            spread_impact: 0.5,
            max_slippage: 0.005,
            partial_fill_probability: 0.05,
            min_order_notional: 10.0,
            simulate_latency: false,
            latency_min_ms: 50,
            latency_max_ms: 200,
            seed: 42,
            book: BookConfig::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_partial_fill_probability(mut self, probability: f64) -> Self {
        self.partial_fill_probability = probability;
        self
    }

    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.simulate_latency = true;
        self.latency_min_ms = min_ms;
        self.latency_max_ms = max_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range("execution", "fee_rate", self.fee_rate, 0.0, 0.05)?;
        ConfigError::check_range("execution", "base_slippage", self.base_slippage, 0.0, 0.05)?;
        ConfigError::check_range("execution", "size_impact_cap", self.size_impact_cap, 0.0, 0.05)?;
        ConfigError::check_range("execution", "spread_impact", self.spread_impact, 0.0, 10.0)?;
        ConfigError::check_range("execution", "max_slippage", self.max_slippage, 0.0, 0.1)?;
        ConfigError::check_range(
            "execution",
            "partial_fill_probability",
            self.partial_fill_probability,
            0.0,
            1.0,
        )?;
        ConfigError::check_range(
            "execution",
            "min_order_notional",
            self.min_order_notional,
            0.0,
            f64::MAX,
        )?;
        if self.latency_min_ms > self.latency_max_ms {
            return Err(ConfigError::Inconsistent {
                section: "execution",
                message: format!(
                    "latency_min_ms ({}) exceeds latency_max_ms ({})",
                    self.latency_min_ms, self.latency_max_ms
                ),
            });
        }
        self.book.validate()
    }

    /// Slippage rate for a fill of `value` quote units in a book quoted at
    /// `spread_pct`, capped at `max_slippage`
    pub fn slippage_rate(&self, value: f64, spread_pct: f64) -> f64 {
        let size_impact = (value / SIZE_IMPACT_DIVISOR).min(self.size_impact_cap);
        (self.base_slippage + size_impact + spread_pct * self.spread_impact)
            .min(self.max_slippage)
            .max(0.0)
    }
}

/// Observed artificial latency
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_ms: f64,
    pub max_ms: u64,
}

impl LatencyStats {
    fn observe(&mut self, latency_ms: u64) {
        self.count += 1;
        self.mean_ms += (latency_ms as f64 - self.mean_ms) / self.count as f64;
        self.max_ms = self.max_ms.max(latency_ms);
    }
}

pub struct ExecutionSimulator {
    config: ExecutionConfig,
    rng: StdRng,
    next_id: u64,
    account: PaperAccount,
    latency: LatencyStats,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig, initial_balance: f64) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            next_id: 1,
            account: PaperAccount::new(initial_balance),
            latency: LatencyStats::default(),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn account(&self) -> &PaperAccount {
        &self.account
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.latency
    }

    /// Shared RNG, for callers that generate books from the same stream
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Place an order, sleeping the sampled latency first when enabled
    pub async fn place_order(&mut self, request: &OrderRequest, snapshot: &MarketSnapshot) -> Order {
        let latency_ms = if self.config.simulate_latency {
            let ms = self
                .rng
                .gen_range(self.config.latency_min_ms..=self.config.latency_max_ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.latency.observe(ms);
            ms
        } else {
            0
        };

        let mut order = self.execute(request, snapshot);
        order.latency_ms = latency_ms;
        order
    }

    /// Validate and fill synchronously
    pub fn execute(&mut self, request: &OrderRequest, snapshot: &MarketSnapshot) -> Order {
        let id = format!("SIM-{}", self.next_id);
        self.next_id += 1;
        let order = Order::pending(id, request);

        if !(request.quantity > 0.0 && request.quantity.is_finite()) {
            return self.rejected(order, RejectReason::InvalidQuantity);
        }

        let levels = snapshot.levels_for_taker(request.side);
        let reference_price = match request.order_type {
            OrderType::Limit { price } => price,
            OrderType::Market => match levels.first() {
                Some(level) => level.price,
                None => return self.rejected(order, RejectReason::NoLiquidity),
            },
        };

        if request.quantity * reference_price < self.config.min_order_notional {
            return self.rejected(order, RejectReason::BelowMinimumSize);
        }

        let worst_price = match (request.order_type, request.side) {
            (OrderType::Market, Side::Buy) => reference_price * (1.0 + self.config.max_slippage),
            _ => reference_price,
        };
        if !self.account.can_afford(
            &request.symbol,
            request.side,
            request.quantity,
            worst_price,
            self.config.fee_rate,
        ) {
            return self.rejected(order, RejectReason::InsufficientBalance);
        }

        let order = match request.order_type {
            OrderType::Market => self.walk_book(order, snapshot),
            OrderType::Limit { price } => self.fill_limit(order, snapshot, price),
        };

        self.account.apply(&order);
        info!(
            id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            status = ?order.status,
            requested = order.quantity,
            executed = order.executed_quantity,
            price = order.executed_price,
            fees = order.fees,
            slippage = order.slippage,
            "Simulated order"
        );
        order
    }

    fn walk_book(&mut self, order: Order, snapshot: &MarketSnapshot) -> Order {
        let levels = snapshot.levels_for_taker(order.side);
        let spread_pct = snapshot.spread_pct();
        // size impact follows the whole order, priced at the top of the book
        let order_value = order.quantity * levels.first().map_or(0.0, |l| l.price);
        let rate = self.config.slippage_rate(order_value, spread_pct);
        let mut remaining = order.quantity;
        let mut fills = Vec::new();
        let mut rates = Vec::new();

        for (i, level) in levels.iter().enumerate() {
            let quantity = remaining.min(level.quantity);
            let price = level.price * (1.0 + order.side.sign() * rate);
            fills.push(Fill {
                price,
                quantity,
                fee: price * quantity * self.config.fee_rate,
            });
            rates.push(rate);
            remaining -= quantity;

            if remaining <= 1e-12 {
                break;
            }
            let more_levels = i + 1 < levels.len();
            if more_levels && self.rng.gen::<f64>() < self.config.partial_fill_probability {
                debug!(id = %order.id, level = i, remaining, "Early stop");
                break;
            }
        }

        order.settle(fills, &rates)
    }

    fn fill_limit(&mut self, order: Order, snapshot: &MarketSnapshot, limit: f64) -> Order {
        let marketable = match order.side {
            Side::Buy => limit >= snapshot.ask,
            Side::Sell => limit <= snapshot.bid,
        };
        if !marketable {
            return self.rejected(order, RejectReason::NotMarketable);
        }
        let fill = Fill {
            price: limit,
            quantity: order.quantity,
            fee: limit * order.quantity * self.config.fee_rate,
        };
        order.settle(vec![fill], &[0.0])
    }

    fn rejected(&self, order: Order, reason: RejectReason) -> Order {
        debug!(id = %order.id, symbol = %order.symbol, %reason, "Order rejected");
        order.reject(reason)
    }

    /// Fresh account and RNG stream, counters keep increasing
    pub fn reset(&mut self, initial_balance: f64) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.account.reset(initial_balance);
        self.latency = LatencyStats::default();
    }
}
