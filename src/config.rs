//! Configuration management
//!
//! One JSON document drives the whole engine. Every section has defaults, so
//! `{}` is a valid configuration and files only need the values they change.
//!
//! ```json
//! {
//!   "account": { "initial_balance": 25000, "base_asset": "ETH", "quote_asset": "USDT" },
//!   "selector": { "hysteresis_secs": 900 },
//!   "risk": { "max_drawdown": 0.1 },
//!   "strategies": { "grid_dca": { "grid_step": 0.5 } },
//!   "backtest": { "seed": 7 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backtest::{BacktestConfig, WalkForwardConfig};
use crate::error::ConfigError;
use crate::execution::ExecutionConfig;
use crate::regime::RegimeConfig;
use crate::risk::RiskConfig;
use crate::selector::SelectorConfig;
use crate::strategies::StrategiesConfig;
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub account: AccountConfig,
    pub selector: SelectorConfig,
    pub regime: RegimeConfig,
    pub risk: RiskConfig,
    pub strategies: StrategiesConfig,
    pub execution: ExecutionConfig,
    pub backtest: BacktestConfig,
    pub walk_forward: WalkForwardConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.account.validate()?;
        self.selector.validate()?;
        self.regime.validate()?;
        self.risk.validate()?;
        self.strategies.validate()?;
        self.execution.validate()?;
        self.backtest.validate()?;
        self.walk_forward.validate()?;
        Ok(())
    }
}

/// Trading account
///
/// # Currency Handling
///
/// Balances are in the quote asset and must match the currency of the price
/// data. No conversion is performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Starting quote balance (default: 10000)
    pub initial_balance: f64,
    pub base_asset: String,
    pub quote_asset: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
        }
    }
}

impl AccountConfig {
    pub fn symbol(&self) -> Symbol {
        Symbol::new(format!("{}{}", self.base_asset, self.quote_asset))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("account", "initial_balance", self.initial_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.account.initial_balance, 10_000.0);
        assert_eq!(config.selector.hysteresis_secs, 300);
        assert_eq!(config.strategies.grid_dca.grid_range, 10.0);
        assert_eq!(config.account.symbol().as_str(), "BTCUSDT");
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let json = r#"{
            "account": { "initial_balance": 5000 },
            "risk": { "max_drawdown": 0.1 },
            "strategies": { "scalping": { "min_interval_secs": 120 } }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.account.initial_balance, 5_000.0);
        assert_eq!(config.account.quote_asset, "USDT");
        assert_eq!(config.risk.max_drawdown, 0.1);
        assert_eq!(config.risk.max_daily_loss, 0.05);
        assert_eq!(config.strategies.scalping.min_interval_secs, 120);
        assert_eq!(config.strategies.scalping.ema_period, 9);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.risk.max_drawdown = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "max_drawdown", .. })
        ));

        let mut config = Config::default();
        config.account.initial_balance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = Config::from_file("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
