//! Core data types used across the trading system

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;

use crate::strategies::StrategyId;

/// Validation errors for candle data
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self::new_unchecked(datetime, open, high, low, close, volume);
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate candle data integrity
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// Check if the candle is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Column extraction helpers, used by every indicator consumer
pub trait CandleSeries {
    fn closes(&self) -> Vec<f64>;
    fn highs(&self) -> Vec<f64>;
    fn lows(&self) -> Vec<f64>;
    fn volumes(&self) -> Vec<f64>;
    fn last_close(&self) -> Option<f64>;
}

impl CandleSeries for [Candle] {
    fn closes(&self) -> Vec<f64> {
        self.iter().map(|c| c.close).collect()
    }

    fn highs(&self) -> Vec<f64> {
        self.iter().map(|c| c.high).collect()
    }

    fn lows(&self) -> Vec<f64> {
        self.iter().map(|c| c.low).collect()
    }

    fn volumes(&self) -> Vec<f64> {
        self.iter().map(|c| c.volume).collect()
    }

    fn last_close(&self) -> Option<f64> {
        self.last().map(|c| c.close)
    }
}

/// Trading pair symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned into every signal, order and log record, so clones
/// must not allocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ============================================================================
// Order book snapshot
// ============================================================================

/// Validation errors for order book snapshots
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SnapshotError {
    #[error("bid ({bid}) must be < ask ({ask})")]
    CrossedBook { bid: f64, ask: f64 },

    #[error("{side} levels are not sorted best-to-worst at index {index}")]
    UnsortedLevels { side: Side, index: usize },

    #[error("level price and quantity must be positive: price={price}, quantity={quantity}")]
    InvalidLevel { price: f64, quantity: f64 },

    #[error("{side} side of the book has no levels")]
    EmptySide { side: Side },
}

/// One price level of an order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Top-of-book plus depth for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    /// Bids sorted best (highest) first
    pub bids: Vec<BookLevel>,
    /// Asks sorted best (lowest) first
    pub asks: Vec<BookLevel>,
}

impl MarketSnapshot {
    /// Build a snapshot from depth levels in any order.
    ///
    /// Levels are sorted best-to-worst and the top of book is taken from the
    /// first level on each side.
    pub fn from_levels(
        mut bids: Vec<BookLevel>,
        mut asks: Vec<BookLevel>,
    ) -> Result<Self, SnapshotError> {
        bids.sort_by_key(|l| Reverse(OrderedFloat(l.price)));
        asks.sort_by_key(|l| OrderedFloat(l.price));

        let (bid, bid_size) = bids.first().map(|l| (l.price, l.quantity)).unwrap_or((0.0, 0.0));
        let (ask, ask_size) = asks
            .first()
            .map(|l| (l.price, l.quantity))
            .unwrap_or((f64::INFINITY, 0.0));

        let snapshot = Self {
            bid,
            ask,
            bid_size,
            ask_size,
            bids,
            asks,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check both sides are quoted, bid < ask and best-to-worst ordering
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.bids.is_empty() {
            return Err(SnapshotError::EmptySide { side: Side::Buy });
        }
        if self.asks.is_empty() {
            return Err(SnapshotError::EmptySide { side: Side::Sell });
        }
        if !(self.bid.is_finite() && self.ask.is_finite()) || self.bid >= self.ask {
            return Err(SnapshotError::CrossedBook {
                bid: self.bid,
                ask: self.ask,
            });
        }

        for level in self.bids.iter().chain(self.asks.iter()) {
            if level.price <= 0.0 || level.quantity <= 0.0 {
                return Err(SnapshotError::InvalidLevel {
                    price: level.price,
                    quantity: level.quantity,
                });
            }
        }

        if let Some(index) = self.bids.windows(2).position(|w| w[1].price > w[0].price) {
            return Err(SnapshotError::UnsortedLevels {
                side: Side::Buy,
                index: index + 1,
            });
        }
        if let Some(index) = self.asks.windows(2).position(|w| w[1].price < w[0].price) {
            return Err(SnapshotError::UnsortedLevels {
                side: Side::Sell,
                index: index + 1,
            });
        }

        Ok(())
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Absolute spread
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Spread as a fraction of mid price. A book without a finite positive
    /// mid reports an infinite spread so every spread gate rejects it.
    pub fn spread_pct(&self) -> f64 {
        let mid = self.mid();
        if mid > 0.0 && mid.is_finite() {
            self.spread() / mid
        } else {
            f64::INFINITY
        }
    }

    /// Levels a taker on `side` consumes: asks for buys, bids for sells
    pub fn levels_for_taker(&self, side: Side) -> &[BookLevel] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// Quote notional resting in the top `levels` of both sides
    pub fn depth_notional(&self, levels: usize) -> f64 {
        self.bids
            .iter()
            .take(levels)
            .chain(self.asks.iter().take(levels))
            .map(BookLevel::notional)
            .sum()
    }
}

// ============================================================================
// Market condition
// ============================================================================

/// Classified market behaviour mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
    Illiquid,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Regime::Trending => "TRENDING",
            Regime::Ranging => "RANGING",
            Regime::Volatile => "VOLATILE",
            Regime::Illiquid => "ILLIQUID",
        };
        write!(f, "{}", s)
    }
}

/// Market descriptor derived from a candle window. Recomputed every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    /// ATR relative to average close
    pub volatility: f64,
    /// ADX / 100, in [0, 1]
    pub trend_strength: f64,
    /// Current volume relative to its 20-bar average
    pub liquidity: f64,
    pub regime: Regime,
    /// 0..=100
    pub confidence: f64,
}

impl MarketCondition {
    /// Descriptor returned when the window is too short to classify
    pub fn insufficient() -> Self {
        Self {
            volatility: 0.0,
            trend_strength: 0.0,
            liquidity: 0.0,
            regime: Regime::Illiquid,
            confidence: 0.0,
        }
    }
}

// ============================================================================
// Signals
// ============================================================================

/// What a strategy wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    /// Liquidate everything the strategy holds
    CloseAll,
    /// Trade inventory back toward neutral
    Rebalance,
}

impl SignalAction {
    /// Directional entry side, if any
    pub fn side(self) -> Option<Side> {
        match self {
            SignalAction::Buy => Some(Side::Buy),
            SignalAction::Sell => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
            SignalAction::CloseAll => "CLOSE_ALL",
            SignalAction::Rebalance => "REBALANCE",
        };
        write!(f, "{}", s)
    }
}

/// Strategy-specific payload attached to a signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    /// Grid ladder level that was filled and the resulting exposure
    Grid { level: usize, exposure_pct: f64 },
    /// Two-sided quotes from the market maker
    Quotes {
        bid: f64,
        ask: f64,
        size: f64,
        skew: f64,
    },
    /// Inventory rebalance instruction
    Rebalance { skew: f64, side: Side },
}

/// Three-tier risk label attached by the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Derive the tier from signal confidence weighted by regime
    pub fn assess(confidence: f64, regime: Regime) -> Self {
        let factor = match regime {
            Regime::Trending => 1.0,
            Regime::Ranging => 0.9,
            Regime::Volatile => 0.6,
            Regime::Illiquid => 0.5,
        };
        let score = confidence * factor;
        if score >= 60.0 {
            RiskLevel::Low
        } else if score >= 35.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        write!(f, "{}", s)
    }
}

/// Trading signal produced once per analysis cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub strategy: StrategyId,
    pub action: SignalAction,
    /// 0..=100
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub quantity: f64,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<SignalDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regime: Option<Regime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl Signal {
    /// Non-actionable signal with a single explanatory reason
    pub fn hold(strategy: StrategyId, price: f64, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            action: SignalAction::Hold,
            confidence: 0.0,
            entry_price: price,
            stop_loss: price,
            take_profit: price,
            quantity: 0.0,
            reasons: vec![reason.into()],
            detail: None,
            regime: None,
            risk_level: None,
        }
    }

    /// Directional signal; confidence is clamped to [0, 100]
    #[allow(clippy::too_many_arguments)]
    pub fn directional(
        strategy: StrategyId,
        action: SignalAction,
        confidence: f64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        quantity: f64,
        reasons: Vec<String>,
    ) -> Self {
        Self {
            strategy,
            action,
            confidence: confidence.clamp(0.0, 100.0),
            entry_price,
            stop_loss,
            take_profit,
            quantity: quantity.max(0.0),
            reasons,
            detail: None,
            regime: None,
            risk_level: None,
        }
    }

    pub fn with_detail(mut self, detail: SignalDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::Hold && self.quantity > 0.0
    }
}

// ============================================================================
// Money Type - Precise Decimal Arithmetic for Monetary Values
// ============================================================================

use rust_decimal::Decimal;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Money type for account balances.
///
/// Wraps `rust_decimal::Decimal` so that paper balances do not drift over
/// thousands of simulated fills.
///
/// # Example
/// ```
/// use crypto_hybrid::Money;
/// let balance = Money::from_f64(100.50);
/// let fill = Money::from_f64(0.25);
/// let total = balance - fill;
/// assert_eq!(total.to_f64(), 100.25);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Create from f64. NaN and infinities map to zero.
    pub fn from_f64(value: f64) -> Self {
        Money(Decimal::try_from(value).unwrap_or_else(|_| {
            if value.is_nan() || value.is_infinite() {
                Decimal::ZERO
            } else {
                Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
            }
        }))
    }

    pub fn to_f64(self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}
