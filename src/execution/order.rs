//! Order types
//!
//! Orders are created PENDING by the simulator and leave that state exactly
//! once. There are no resting orders: limits either cross immediately or are
//! rejected.

use serde::{Deserialize, Serialize};

use crate::strategies::StrategyId;
use crate::{Side, Symbol};

/// Order type - determines execution logic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Walk the book until filled or exhausted
    Market,

    /// Fill at `price` only if immediately marketable
    /// Buy limit: price ≥ best ask
    /// Sell limit: price ≤ best bid
    Limit { price: f64 },
}

/// Order state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    PartiallyFilled,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        self != OrderStatus::Pending
    }
}

/// Why an order was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BelowMinimumSize,
    InsufficientBalance,
    NoLiquidity,
    NotMarketable,
    InvalidQuantity,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::BelowMinimumSize => "order below minimum size",
            RejectReason::InsufficientBalance => "insufficient balance",
            RejectReason::NoLiquidity => "no liquidity",
            RejectReason::NotMarketable => "limit price not marketable",
            RejectReason::InvalidQuantity => "invalid quantity",
        };
        f.write_str(s)
    }
}

/// One execution against one book level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
}

/// What the caller wants executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    /// Strategy that asked for the order, for fill routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyId>,
}

impl OrderRequest {
    pub fn market(symbol: Symbol, side: Side, quantity: f64) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            quantity,
            strategy: None,
        }
    }

    pub fn limit(symbol: Symbol, side: Side, quantity: f64, price: f64) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Limit { price },
            quantity,
            strategy: None,
        }
    }

    pub fn from_strategy(mut self, strategy: StrategyId) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Executed (or rejected) order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Requested quantity
    pub quantity: f64,
    pub status: OrderStatus,
    /// Volume-weighted fill price, 0 when nothing executed
    pub executed_price: f64,
    pub executed_quantity: f64,
    pub fees: f64,
    /// Quantity-weighted slippage rate applied to the fills
    pub slippage: f64,
    pub fills: Vec<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyId>,
}

impl Order {
    pub fn pending(id: String, request: &OrderRequest) -> Self {
        Self {
            id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            status: OrderStatus::Pending,
            executed_price: 0.0,
            executed_quantity: 0.0,
            fees: 0.0,
            slippage: 0.0,
            fills: Vec::new(),
            reject_reason: None,
            latency_ms: 0,
            strategy: request.strategy,
        }
    }

    pub(crate) fn reject(mut self, reason: RejectReason) -> Self {
        self.status = OrderStatus::Rejected;
        self.reject_reason = Some(reason);
        self
    }

    /// Record fills and settle status, price, fees and slippage.
    /// `slippage_rates` pairs with `fills`.
    pub(crate) fn settle(mut self, fills: Vec<Fill>, slippage_rates: &[f64]) -> Self {
        let executed: f64 = fills.iter().map(|f| f.quantity).sum();
        if executed <= 0.0 {
            return self.reject(RejectReason::NoLiquidity);
        }
        let notional: f64 = fills.iter().map(|f| f.price * f.quantity).sum();
        let weighted_slippage: f64 = fills
            .iter()
            .zip(slippage_rates)
            .map(|(f, rate)| f.quantity * rate)
            .sum();

        self.executed_quantity = executed;
        self.executed_price = notional / executed;
        self.fees = fills.iter().map(|f| f.fee).sum();
        self.slippage = weighted_slippage / executed;
        self.status = if executed + 1e-12 < self.quantity {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Filled
        };
        self.fills = fills;
        self
    }

    /// Cancel a still-pending order. Terminal orders are left untouched.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        true
    }

    pub fn notional(&self) -> f64 {
        self.executed_price * self.executed_quantity
    }

    pub fn is_filled(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::PartiallyFilled
        )
    }
}
