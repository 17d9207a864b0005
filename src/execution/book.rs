//! Synthetic order books for simulation and backtests

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{BookLevel, MarketSnapshot, SnapshotError};

/// Parameters of generated books
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Quoted spread as a fraction of mid (default: 0.0005)
    pub spread_pct: f64,
    /// Levels per side (default: 10)
    pub levels: usize,
    /// Average quote notional per level (default: 50000)
    pub level_notional: f64,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            spread_pct: 0.0005,
            levels: 10,
            level_notional: 50_000.0,
        }
    }
}

impl BookConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range("book", "spread_pct", self.spread_pct, 1e-6, 0.1)?;
        ConfigError::check_positive("book", "level_notional", self.level_notional)?;
        if self.levels == 0 {
            return Err(ConfigError::Inconsistent {
                section: "book",
                message: "levels must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Book around `mid` with this configuration
    pub fn generate<R: Rng>(&self, mid: f64, rng: &mut R) -> Result<MarketSnapshot, SnapshotError> {
        let level_qty = if mid > 0.0 {
            self.level_notional / mid
        } else {
            0.0
        };
        SyntheticBook::generate(mid, self.spread_pct, self.levels, level_qty, rng)
    }
}

pub struct SyntheticBook;

impl SyntheticBook {
    /// Symmetric book around `mid`.
    ///
    /// Best bid and ask sit half a spread from mid; each deeper level steps
    /// out by another half spread. Quantities are `level_qty` scaled by
    /// U(0.5, 1.5) per level.
    pub fn generate<R: Rng>(
        mid: f64,
        spread_pct: f64,
        levels: usize,
        level_qty: f64,
        rng: &mut R,
    ) -> Result<MarketSnapshot, SnapshotError> {
        if mid <= 0.0 || level_qty <= 0.0 || !mid.is_finite() {
            return Err(SnapshotError::InvalidLevel {
                price: mid,
                quantity: level_qty,
            });
        }

        let half = mid * spread_pct / 2.0;
        let mut bids = Vec::with_capacity(levels);
        let mut asks = Vec::with_capacity(levels);
        for i in 0..levels {
            let offset = half * (i + 1) as f64;
            bids.push(BookLevel::new(
                mid - offset,
                level_qty * rng.gen_range(0.5..1.5),
            ));
            asks.push(BookLevel::new(
                mid + offset,
                level_qty * rng.gen_range(0.5..1.5),
            ));
        }

        MarketSnapshot::from_levels(bids, asks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_book_is_valid_and_centered() {
        let mut rng = StdRng::seed_from_u64(1);
        let book = SyntheticBook::generate(100.0, 0.002, 5, 2.0, &mut rng).unwrap();
        assert_eq!(book.bids.len(), 5);
        assert_eq!(book.asks.len(), 5);
        assert_relative_eq!(book.mid(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(book.spread_pct(), 0.002, epsilon = 1e-9);
        assert!(book.validate().is_ok());
        assert!(book.asks.iter().all(|l| (1.0..3.0).contains(&l.quantity)));
    }

    #[test]
    fn test_same_seed_same_book() {
        let config = BookConfig::default();
        let a = config.generate(42_000.0, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = config.generate(42_000.0, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_mid_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(SyntheticBook::generate(0.0, 0.001, 3, 1.0, &mut rng).is_err());
    }
}
