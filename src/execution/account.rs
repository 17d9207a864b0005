//! Paper account
//!
//! Quote balance plus base holdings per symbol, both kept as [`Money`] so
//! balances settle exactly across long simulations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::order::Order;
use crate::{Money, Side, Symbol};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperAccount {
    quote: Money,
    holdings: BTreeMap<Symbol, Money>,
}

impl PaperAccount {
    pub fn new(initial_quote: f64) -> Self {
        Self {
            quote: Money::from_f64(initial_quote),
            holdings: BTreeMap::new(),
        }
    }

    pub fn quote_balance(&self) -> f64 {
        self.quote.to_f64()
    }

    pub fn holding(&self, symbol: &Symbol) -> f64 {
        self.holdings
            .get(symbol)
            .copied()
            .unwrap_or(Money::ZERO)
            .to_f64()
    }

    /// Quote value of the account with holdings marked at `price`
    pub fn equity(&self, symbol: &Symbol, price: f64) -> f64 {
        self.quote_balance() + self.holding(symbol) * price
    }

    /// Whether a taker order of `quantity` at roughly `price` is affordable.
    /// Buys need quote for notional plus fees, sells need the base units.
    pub fn can_afford(&self, symbol: &Symbol, side: Side, quantity: f64, price: f64, fee_rate: f64) -> bool {
        match side {
            Side::Buy => quantity * price * (1.0 + fee_rate) <= self.quote_balance() + 1e-9,
            Side::Sell => quantity <= self.holding(symbol) + 1e-12,
        }
    }

    /// Settle an executed order: move quote and base, deduct fees from quote
    pub fn apply(&mut self, order: &Order) {
        if !order.is_filled() {
            return;
        }
        let notional = Money::from_f64(order.notional());
        let fees = Money::from_f64(order.fees);
        let quantity = Money::from_f64(order.executed_quantity);
        let holding = self.holdings.entry(order.symbol.clone()).or_insert(Money::ZERO);

        match order.side {
            Side::Buy => {
                self.quote -= notional + fees;
                *holding += quantity;
            }
            Side::Sell => {
                self.quote += notional - fees;
                *holding -= quantity;
            }
        }
    }

    pub fn reset(&mut self, initial_quote: f64) {
        self.quote = Money::from_f64(initial_quote);
        self.holdings.clear();
    }
}
