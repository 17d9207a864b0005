//! Trading Strategies Module
//!
//! The five signal generators and the abstractions they share: the
//! [`Strategy`] trait, stable [`StrategyId`]s, a factory table and the
//! [`StrategyBook`] that owns one instance of each generator.

pub mod grid_dca;
pub mod market_making;
pub mod mean_reversion;
pub mod scalping;
pub mod trend_following;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::{Candle, CandleSeries, MarketSnapshot, Side, Signal};

pub use grid_dca::{GridDcaConfig, GridDcaStrategy};
pub use market_making::{MarketMakingConfig, MarketMakingStrategy};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use scalping::{ScalpingConfig, ScalpingStrategy};
pub use trend_following::{TrendFollowingConfig, TrendFollowingStrategy};

/// Stable identifier of a signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    TrendFollowing,
    MeanReversion,
    GridDca,
    Scalping,
    MarketMaking,
}

impl StrategyId {
    pub const ALL: [StrategyId; 5] = [
        StrategyId::TrendFollowing,
        StrategyId::MeanReversion,
        StrategyId::GridDca,
        StrategyId::Scalping,
        StrategyId::MarketMaking,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyId::TrendFollowing => "trend_following",
            StrategyId::MeanReversion => "mean_reversion",
            StrategyId::GridDca => "grid_dca",
            StrategyId::Scalping => "scalping",
            StrategyId::MarketMaking => "market_making",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| {
                format!(
                    "unknown strategy '{}', expected one of: {}",
                    s,
                    StrategyId::ALL.map(StrategyId::name).join(", ")
                )
            })
    }
}

/// Signal generator contract
///
/// `analyze` never fails: malformed-but-typed input (short windows, missing
/// snapshot where one is required) yields a HOLD signal with a reason.
pub trait Strategy: Send {
    fn id(&self) -> StrategyId;

    /// Minimum window length for a non-trivial analysis
    fn min_candles(&self) -> usize;

    fn analyze(&mut self, candles: &[Candle], snapshot: Option<&MarketSnapshot>) -> Signal;

    /// Account balance used for position sizing
    fn set_balance(&mut self, balance: f64);

    /// Called when the selector switches to this strategy
    fn activate(&mut self, _candles: &[Candle]) {}

    /// Fill notification for orders this strategy requested
    fn on_fill(&mut self, _side: Side, _quantity: f64, _price: f64) {}

    /// Drop any cross-call state
    fn reset(&mut self) {}
}

/// Risk-based sizing shared by the directional generators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of balance lost if the stop is hit (default: 0.02)
    pub risk_per_trade: f64,
    /// Maximum position notional as a fraction of balance (default: 0.25)
    pub max_position_pct: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.02,
            max_position_pct: 0.25,
        }
    }
}

impl SizingConfig {
    pub fn quantity(&self, balance: f64, entry: f64, stop: f64) -> f64 {
        risk_sized_quantity(
            balance,
            self.risk_per_trade,
            self.max_position_pct,
            entry,
            stop,
        )
    }
}

/// `balance × risk / |entry − stop|`, capped at `balance × max_position_pct / entry`
pub fn risk_sized_quantity(
    balance: f64,
    risk_fraction: f64,
    max_position_pct: f64,
    entry: f64,
    stop: f64,
) -> f64 {
    let stop_distance = (entry - stop).abs();
    if balance <= 0.0 || entry <= 0.0 || stop_distance <= f64::EPSILON {
        return 0.0;
    }
    let quantity = balance * risk_fraction / stop_distance;
    let cap = balance * max_position_pct / entry;
    quantity.min(cap).max(0.0)
}

/// Returns the latest close, or a HOLD signal when the window is too short
pub(crate) fn ensure_history(
    id: StrategyId,
    candles: &[Candle],
    min_candles: usize,
) -> Result<f64, Signal> {
    let price = candles.last_close().unwrap_or(0.0);
    if candles.len() < min_candles {
        return Err(Signal::hold(
            id,
            price,
            format!(
                "Insufficient data: {} candles, need {}",
                candles.len(),
                min_candles
            ),
        ));
    }
    Ok(price)
}

/// Per-generator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    pub sizing: SizingConfig,
    pub trend_following: TrendFollowingConfig,
    pub mean_reversion: MeanReversionConfig,
    pub grid_dca: GridDcaConfig,
    pub scalping: ScalpingConfig,
    pub market_making: MarketMakingConfig,
}

impl StrategiesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range("sizing", "risk_per_trade", self.sizing.risk_per_trade, 0.0, 1.0)?;
        ConfigError::check_range(
            "sizing",
            "max_position_pct",
            self.sizing.max_position_pct,
            0.0,
            1.0,
        )?;
        self.trend_following.validate()?;
        self.mean_reversion.validate()?;
        self.grid_dca.validate()?;
        self.scalping.validate()?;
        self.market_making.validate()?;
        Ok(())
    }
}

type Factory = fn(&StrategiesConfig, f64) -> Box<dyn Strategy>;

/// Registration table: one factory per generator
const FACTORIES: [(StrategyId, Factory); 5] = [
    (StrategyId::TrendFollowing, trend_following::create),
    (StrategyId::MeanReversion, mean_reversion::create),
    (StrategyId::GridDca, grid_dca::create),
    (StrategyId::Scalping, scalping::create),
    (StrategyId::MarketMaking, market_making::create),
];

/// Owns one instance of every generator, keyed by id
pub struct StrategyBook {
    strategies: BTreeMap<StrategyId, Box<dyn Strategy>>,
}

impl StrategyBook {
    pub fn from_config(config: &StrategiesConfig, balance: f64) -> Self {
        let strategies = FACTORIES
            .iter()
            .map(|(id, factory)| (*id, factory(config, balance)))
            .collect();
        Self { strategies }
    }

    pub fn get(&self, id: StrategyId) -> Option<&dyn Strategy> {
        self.strategies.get(&id).map(|s| &**s)
    }

    pub fn get_mut(&mut self, id: StrategyId) -> Option<&mut Box<dyn Strategy>> {
        self.strategies.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = StrategyId> + '_ {
        self.strategies.keys().copied()
    }

    pub fn set_balance(&mut self, balance: f64) {
        for strategy in self.strategies.values_mut() {
            strategy.set_balance(balance);
        }
    }

    pub fn reset_all(&mut self) {
        for strategy in self.strategies.values_mut() {
            strategy.reset();
        }
    }
}

impl fmt::Debug for StrategyBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyBook")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_book_contains_every_generator() {
        let book = StrategyBook::from_config(&StrategiesConfig::default(), 10_000.0);
        let ids: Vec<StrategyId> = book.ids().collect();
        assert_eq!(ids, StrategyId::ALL.to_vec());
        for id in StrategyId::ALL {
            assert_eq!(book.get(id).map(|s| s.id()), Some(id));
        }
    }

    #[test]
    fn test_strategy_id_names_round_trip() {
        for id in StrategyId::ALL {
            assert_eq!(id.name().parse::<StrategyId>(), Ok(id));
        }
        assert!("martingale".parse::<StrategyId>().is_err());
        assert_eq!(
            serde_json::to_string(&StrategyId::GridDca).unwrap(),
            "\"grid_dca\""
        );
    }

    #[test]
    fn test_risk_sized_quantity() {
        // 2% of 10k over a 2.0 stop distance = 100 units, capped at 25% / 100 = 25
        let qty = risk_sized_quantity(10_000.0, 0.02, 0.25, 100.0, 98.0);
        assert_relative_eq!(qty, 25.0);

        let qty = risk_sized_quantity(10_000.0, 0.02, 1.0, 100.0, 90.0);
        assert_relative_eq!(qty, 20.0);

        assert_eq!(risk_sized_quantity(10_000.0, 0.02, 0.25, 100.0, 100.0), 0.0);
        assert_eq!(risk_sized_quantity(0.0, 0.02, 0.25, 100.0, 90.0), 0.0);
    }
}
