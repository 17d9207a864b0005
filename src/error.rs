//! Error types
//!
//! Domain outcomes such as insufficient data, rejected orders and risk halts
//! are carried in return values (HOLD signals, rejected orders). The types here
//! cover configuration mistakes and collaborator failures only.

use thiserror::Error;

/// Invalid configuration value
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{section}.{field} must be greater than zero (got {value})")]
    NotPositive {
        section: &'static str,
        field: &'static str,
        value: f64,
    },

    #[error("{section}.{field} must be within [{min}, {max}] (got {value})")]
    OutOfRange {
        section: &'static str,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{section}: {message}")]
    Inconsistent {
        section: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn check_positive(
        section: &'static str,
        field: &'static str,
        value: f64,
    ) -> Result<(), ConfigError> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::NotPositive {
                section,
                field,
                value,
            })
        }
    }

    pub(crate) fn check_range(
        section: &'static str,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ConfigError> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange {
                section,
                field,
                value,
                min,
                max,
            })
        }
    }
}

/// Failures surfaced by the trading engine facade
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid market snapshot: {0}")]
    Snapshot(#[from] crate::types::SnapshotError),

    #[error("live execution failed: {0}")]
    LiveExecutionFailed(String),

    #[error("market data unavailable: {0}")]
    MarketData(String),
}
