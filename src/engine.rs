//! Trading engine facade
//!
//! One [`TradingEngine`] owns the selector, its risk state and the execution
//! path for a single symbol. Callers drive it tick by tick: analyze, then
//! execute the resulting signal. There is no global state; run several
//! engines for several symbols.

use std::sync::Arc;
use tracing::{info, warn};

use crate::backtest::{BacktestResult, Backtester};
use crate::data::MarketDataSource;
use crate::error::EngineError;
use crate::execution::{
    ExecutionSimulator, LatencyStats, Order, OrderRequest, PaperAccount,
};
use crate::journal::{DecisionRecorder, LogRecord};
use crate::risk::RiskState;
use crate::selector::HybridManager;
use crate::{Candle, Config, MarketSnapshot, Side, Signal, SignalAction, SignalDetail, Symbol};

/// Submits orders to a real venue. Signing, transport and retries are the
/// implementor's concern.
pub trait LiveExecutor: Send {
    fn submit(&mut self, request: &OrderRequest) -> Result<Order, EngineError>;
}

pub enum ExecutionMode {
    Simulation,
    Live(Box<dyn LiveExecutor>),
}

impl ExecutionMode {
    pub fn is_simulation(&self) -> bool {
        matches!(self, ExecutionMode::Simulation)
    }
}

impl std::fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Simulation => f.write_str("Simulation"),
            ExecutionMode::Live(_) => f.write_str("Live"),
        }
    }
}

/// Average-cost position used for realized P&L
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub quantity: f64,
    pub cost: f64,
}

impl Position {
    pub fn average_price(&self) -> f64 {
        if self.quantity > 0.0 {
            self.cost / self.quantity
        } else {
            0.0
        }
    }

    /// Apply a fill; returns realized P&L for sells
    fn apply(&mut self, side: Side, quantity: f64, price: f64, fees: f64) -> Option<f64> {
        match side {
            Side::Buy => {
                self.quantity += quantity;
                self.cost += quantity * price + fees;
                None
            }
            Side::Sell => {
                let closed = quantity.min(self.quantity);
                let basis = self.average_price() * closed;
                self.quantity -= closed;
                self.cost = (self.cost - basis).max(0.0);
                if self.quantity <= 1e-12 {
                    *self = Position::default();
                }
                Some(quantity * price - fees - basis)
            }
        }
    }
}

pub struct TradingEngine {
    config: Config,
    manager: HybridManager,
    simulator: ExecutionSimulator,
    mode: ExecutionMode,
    recorder: Arc<dyn DecisionRecorder>,
    position: Position,
    last_price: f64,
}

impl TradingEngine {
    pub fn new(
        config: Config,
        mode: ExecutionMode,
        recorder: Arc<dyn DecisionRecorder>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let manager = HybridManager::new(&config, recorder.clone());
        let simulator =
            ExecutionSimulator::new(config.execution.clone(), config.account.initial_balance);
        info!(
            symbol = %config.account.symbol(),
            mode = ?mode,
            balance = config.account.initial_balance,
            "Engine ready"
        );
        Ok(Self {
            config,
            manager,
            simulator,
            mode,
            recorder,
            position: Position::default(),
            last_price: 0.0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn symbol(&self) -> &Symbol {
        self.manager.symbol()
    }

    pub fn manager(&self) -> &HybridManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut HybridManager {
        &mut self.manager
    }

    pub fn risk_state(&self) -> &RiskState {
        self.manager.risk_state()
    }

    pub fn account(&self) -> &PaperAccount {
        self.simulator.account()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.simulator.latency_stats()
    }

    /// One decision cycle on the supplied window
    pub fn analyze(&mut self, candles: &[Candle], snapshot: Option<&MarketSnapshot>) -> Signal {
        if let Some(close) = candles.last().map(|c| c.close) {
            self.last_price = close;
        }
        let signal = self.manager.analyze(candles, snapshot);
        if signal.is_actionable() {
            self.recorder.record(&LogRecord::Decision {
                timestamp: candles
                    .last()
                    .map(|c| c.datetime)
                    .unwrap_or(chrono::DateTime::UNIX_EPOCH),
                symbol: self.symbol().clone(),
                from: None,
                strategy: signal.strategy,
                regime: signal.regime.unwrap_or(crate::Regime::Illiquid),
                action: signal.action,
                confidence: signal.confidence,
                risk_level: signal.risk_level.unwrap_or(crate::RiskLevel::High),
                reason: signal.reasons.join("; "),
            });
        }
        signal
    }

    /// Pull candles and a book from `source` and analyze. Source failures
    /// degrade to analyzing whatever was obtained.
    pub fn analyze_from(
        &mut self,
        source: &dyn MarketDataSource,
        interval: &str,
        limit: usize,
        depth: usize,
    ) -> Signal {
        let symbol = self.symbol().clone();
        let candles = source
            .fetch_candles(&symbol, interval, limit)
            .unwrap_or_else(|e| {
                warn!(symbol = %symbol, error = %e, "Candle fetch failed");
                Vec::new()
            });
        let snapshot = match source.fetch_order_book(&symbol, depth) {
            Ok(book) => Some(book),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Order book fetch failed");
                None
            }
        };
        self.analyze(&candles, snapshot.as_ref())
    }

    /// Execute a request on the configured path and book the result
    pub async fn place_order(
        &mut self,
        request: &OrderRequest,
        snapshot: &MarketSnapshot,
    ) -> Result<Order, EngineError> {
        let order = match &mut self.mode {
            ExecutionMode::Simulation => self.simulator.place_order(request, snapshot).await,
            ExecutionMode::Live(executor) => executor.submit(request)?,
        };
        self.settle(&order, snapshot.mid());
        Ok(order)
    }

    /// Turn a signal into an order and place it. HOLD and signals that
    /// resolve to nothing tradeable return `Ok(None)`.
    pub async fn execute_signal(
        &mut self,
        signal: &Signal,
        snapshot: Option<&MarketSnapshot>,
    ) -> Result<Option<Order>, EngineError> {
        let Some(request) = self.order_for(signal) else {
            return Ok(None);
        };

        let generated;
        let snapshot = match snapshot {
            Some(s) => s,
            None => {
                let mid = if signal.entry_price > 0.0 {
                    signal.entry_price
                } else {
                    self.last_price
                };
                let book = self.config.execution.book.clone();
                generated = book.generate(mid, self.simulator.rng_mut())?;
                &generated
            }
        };

        self.place_order(&request, snapshot).await.map(Some)
    }

    /// Order request for a signal, or `None` when nothing should trade
    pub fn order_for(&self, signal: &Signal) -> Option<OrderRequest> {
        let held = self.held_quantity();
        let (side, quantity) = match signal.action {
            SignalAction::Hold => return None,
            SignalAction::Buy => (Side::Buy, signal.quantity),
            SignalAction::Sell => (Side::Sell, signal.quantity.min(held)),
            SignalAction::CloseAll => (Side::Sell, held),
            SignalAction::Rebalance => match signal.detail {
                Some(SignalDetail::Rebalance { side, .. }) => {
                    let quantity = match side {
                        Side::Sell => signal.quantity.min(held),
                        Side::Buy => signal.quantity,
                    };
                    (side, quantity)
                }
                _ => return None,
            },
        };
        if quantity <= 0.0 || !quantity.is_finite() {
            return None;
        }
        Some(OrderRequest::market(self.symbol().clone(), side, quantity).from_strategy(signal.strategy))
    }

    fn held_quantity(&self) -> f64 {
        if self.mode.is_simulation() {
            self.simulator.account().holding(self.symbol())
        } else {
            self.position.quantity
        }
    }

    fn settle(&mut self, order: &Order, mark: f64) {
        if !order.is_filled() {
            return;
        }
        self.last_price = mark;
        let pnl = self.position.apply(
            order.side,
            order.executed_quantity,
            order.executed_price,
            order.fees,
        );
        if let Some(strategy) = order.strategy {
            self.manager
                .on_fill(strategy, order.side, order.executed_quantity, order.executed_price);
        }
        if let Some(pnl) = pnl {
            self.manager.record_trade_result(pnl);
        }
        self.mark_to_market(mark);

        if let Some(strategy) = order.strategy {
            self.recorder.record(&LogRecord::Trade {
                timestamp: chrono::Utc::now(),
                symbol: order.symbol.clone(),
                strategy,
                side: order.side,
                quantity: order.executed_quantity,
                price: order.executed_price,
                pnl,
                detail: format!("{} {:?}", order.id, order.status),
            });
        }
    }

    /// Revalue the account at `price` and refresh the risk state
    pub fn mark_to_market(&mut self, price: f64) {
        self.last_price = price;
        let held = self.held_quantity();
        self.manager.set_position_size(held * price);
        if self.mode.is_simulation() {
            let equity = self.simulator.account().equity(self.symbol(), price);
            self.manager.update_balance(equity);
        }
    }

    pub fn reset_daily(&mut self) {
        self.manager.reset_daily();
    }

    /// Replay history with a fresh selector built from this engine's config
    pub fn run_backtest(&self, candles: &[Candle]) -> BacktestResult {
        Backtester::new(self.config.clone())
            .with_recorder(self.recorder.clone())
            .run(candles)
    }
}

impl std::fmt::Debug for TradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingEngine")
            .field("symbol", self.symbol())
            .field("mode", &self.mode)
            .field("strategy", &self.manager.current_strategy())
            .field("position", &self.position)
            .finish()
    }
}
