//! Command implementations for the CLI

pub mod analyze;
pub mod backtest;
pub mod simulate;
pub mod walk_forward;

use anyhow::Result;
use crypto_hybrid::Config;
use std::path::Path;
use tracing::info;

/// Config from file, or defaults, with an optional base-asset override
pub fn load_config(path: Option<&Path>, base: Option<String>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(base) = base {
        info!("Overriding base asset to: {}", base);
        config.account.base_asset = base.to_uppercase();
    }

    Ok(config)
}

pub fn rule() -> String {
    "=".repeat(60)
}
