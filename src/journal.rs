//! Decision, trade and risk logs
//!
//! The engine reports what it decided through a [`DecisionRecorder`].
//! Recording is fire-and-forget: implementations must not block for long,
//! must not panic, and have no way to fail the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::strategies::StrategyId;
use crate::{Regime, RiskLevel, Side, SignalAction, Symbol};

/// One log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    /// Strategy switch or per-cycle decision
    Decision {
        timestamp: DateTime<Utc>,
        symbol: Symbol,
        from: Option<StrategyId>,
        strategy: StrategyId,
        regime: Regime,
        action: SignalAction,
        confidence: f64,
        risk_level: RiskLevel,
        reason: String,
    },
    /// Closed trade or simulated fill
    Trade {
        timestamp: DateTime<Utc>,
        symbol: Symbol,
        strategy: StrategyId,
        side: Side,
        quantity: f64,
        price: f64,
        pnl: Option<f64>,
        detail: String,
    },
    /// Risk gate intervention
    Risk {
        timestamp: DateTime<Utc>,
        symbol: Symbol,
        should_stop: bool,
        current_drawdown: f64,
        daily_loss: f64,
        message: String,
    },
}

pub trait DecisionRecorder: Send + Sync {
    fn record(&self, record: &LogRecord);
}

/// Emits every record as a structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl DecisionRecorder for TracingRecorder {
    fn record(&self, record: &LogRecord) {
        match record {
            LogRecord::Decision {
                symbol,
                from,
                strategy,
                regime,
                action,
                confidence,
                risk_level,
                reason,
                ..
            } => info!(
                target: "decisions",
                symbol = %symbol,
                from = ?from,
                strategy = %strategy,
                regime = %regime,
                action = %action,
                confidence,
                risk = %risk_level,
                "{}", reason
            ),
            LogRecord::Trade {
                symbol,
                strategy,
                side,
                quantity,
                price,
                pnl,
                detail,
                ..
            } => info!(
                target: "trades",
                symbol = %symbol,
                strategy = %strategy,
                side = %side,
                quantity,
                price,
                pnl = ?pnl,
                "{}", detail
            ),
            LogRecord::Risk {
                symbol,
                should_stop,
                current_drawdown,
                daily_loss,
                message,
                ..
            } => warn!(
                target: "risk",
                symbol = %symbol,
                should_stop,
                current_drawdown,
                daily_loss,
                "{}", message
            ),
        }
    }
}

/// Keeps records in memory; used by tests and the CLI summaries
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        // a poisoned lock still holds valid records
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DecisionRecorder for MemoryRecorder {
    fn record(&self, record: &LogRecord) {
        match self.records.lock() {
            Ok(mut guard) => guard.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl DecisionRecorder for NullRecorder {
    fn record(&self, _record: &LogRecord) {}
}
