//! Data loading and market data sources
//!
//! CSV history for backtests plus the [`MarketDataSource`] seam the engine
//! pulls candles and books through. The CSV-backed source stands in for an
//! exchange feed in simulation mode.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::execution::BookConfig;
use crate::{Candle, MarketSnapshot, Symbol};

// =============================================================================
// CSV Data Loading
// =============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // no timezone: assume UTC
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse datetime: {}", s))
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64> {
    record
        .get(index)
        .with_context(|| format!("Missing {} column", name))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))
}

/// Load OHLCV data from a `datetime,open,high,low,close,volume` CSV file
///
/// Every row is validated; rows must be strictly increasing in time.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles: Vec<Candle> = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Failed to read row {}", row))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let datetime = parse_datetime(dt_str.trim())?;
        let candle = Candle::new(
            datetime,
            parse_field(&record, 1, "open")?,
            parse_field(&record, 2, "high")?,
            parse_field(&record, 3, "low")?,
            parse_field(&record, 4, "close")?,
            parse_field(&record, 5, "volume")?,
        )
        .with_context(|| format!("Invalid candle at row {}", row))?;

        if let Some(prev) = candles.last() {
            if candle.datetime <= prev.datetime {
                anyhow::bail!(
                    "Row {}: timestamp {} is not after {}",
                    row,
                    candle.datetime,
                    prev.datetime
                );
            }
        }
        candles.push(candle);
    }

    info!(path = %path.display(), candles = candles.len(), "Loaded candles");
    Ok(candles)
}

/// Write candles in the format [`load_csv`] reads
pub fn save_csv(path: impl AsRef<Path>, candles: &[Candle]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    writer.write_record(["datetime", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        writer.write_record(&[
            c.datetime.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

// =============================================================================
// Data Validation
// =============================================================================

/// Validate candle data for consistency
pub fn validate_candles(candles: &[Candle]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if candles.is_empty() {
        errors.push("No candles provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, candle) in candles.iter().enumerate() {
        if let Err(e) = candle.validate() {
            errors.push(format!("Candle {}: {}", i, e));
        }
        if i > 0 {
            let prev = &candles[i - 1].datetime;
            if candle.datetime == *prev {
                errors.push(format!("Candle {}: duplicate timestamp {}", i, candle.datetime));
            } else if candle.datetime < *prev {
                errors.push(format!("Candle {}: not chronological", i));
            }
        }
        if candle.volume == 0.0 {
            warnings.push(format!("Candle {}: zero volume", i));
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Market data sources
// =============================================================================

/// Where the engine gets candles and books from
///
/// Failures and empty results are treated as insufficient data by callers;
/// sources should not retry internally.
pub trait MarketDataSource: Send + Sync {
    /// Most recent `limit` candles, oldest first
    fn fetch_candles(&self, symbol: &Symbol, interval: &str, limit: usize) -> Result<Vec<Candle>, EngineError>;

    fn fetch_order_book(&self, symbol: &Symbol, depth: usize) -> Result<MarketSnapshot, EngineError>;
}

/// Serves loaded history and synthesizes books around the latest close
pub struct CsvMarketData {
    series: BTreeMap<Symbol, Vec<Candle>>,
    book: BookConfig,
    seed: u64,
}

impl CsvMarketData {
    pub fn new(book: BookConfig, seed: u64) -> Self {
        Self {
            series: BTreeMap::new(),
            book,
            seed,
        }
    }

    pub fn with_series(mut self, symbol: Symbol, candles: Vec<Candle>) -> Self {
        self.series.insert(symbol, candles);
        self
    }

    pub fn load(mut self, symbol: Symbol, path: impl AsRef<Path>) -> Result<Self> {
        let candles = load_csv(path)?;
        self.series.insert(symbol, candles);
        Ok(self)
    }

    fn series(&self, symbol: &Symbol) -> Result<&[Candle], EngineError> {
        match self.series.get(symbol) {
            Some(candles) if !candles.is_empty() => Ok(candles),
            _ => {
                warn!(symbol = %symbol, "No data loaded");
                Err(EngineError::MarketData(format!("no candles for {}", symbol)))
            }
        }
    }
}

impl MarketDataSource for CsvMarketData {
    fn fetch_candles(&self, symbol: &Symbol, _interval: &str, limit: usize) -> Result<Vec<Candle>, EngineError> {
        let candles = self.series(symbol)?;
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }

    fn fetch_order_book(&self, symbol: &Symbol, depth: usize) -> Result<MarketSnapshot, EngineError> {
        let candles = self.series(symbol)?;
        let mid = candles.last().map(|c| c.close).unwrap_or(0.0);
        // same history length, same book
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(candles.len() as u64));
        let config = BookConfig {
            levels: depth.max(1),
            ..self.book.clone()
        };
        Ok(config.generate(mid, &mut rng)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
