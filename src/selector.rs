//! Hybrid strategy selector
//!
//! Composes the regime classifier, the five generators and the risk gate.
//! Each cycle:
//!
//! 1. classify the window
//! 2. short-circuit to a stop signal if the risk manager has halted trading
//! 3. switch to the regime's preferred strategy if it differs from the current
//!    one and the hysteresis delay has elapsed since the last switch
//! 4. run the current strategy, gate the signal, annotate regime and risk level
//!
//! Time is the newest candle's timestamp, so replays are deterministic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ConfigError;
use crate::journal::{DecisionRecorder, LogRecord};
use crate::regime::{RegimeClassifier, RegimeConfig};
use crate::risk::{RiskAction, RiskConfig, RiskManager, RiskState};
use crate::strategies::{StrategiesConfig, Strategy, StrategyBook, StrategyId};
use crate::{
    Candle, CandleSeries, MarketCondition, MarketSnapshot, Regime, RiskLevel, Side, Signal, Symbol,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Minimum seconds between strategy switches (default: 300)
    pub hysteresis_secs: i64,
    /// TRENDING needs at least this trend strength to pick trend following (default: 0.25)
    pub min_trend_strength: f64,
    /// RANGING below this volatility goes to the grid (default: 0.01)
    pub grid_max_volatility: f64,
    /// VOLATILE needs at least this liquidity for the liquid strategies (default: 1.0)
    pub min_liquidity: f64,
    /// VOLATILE and liquid at or above this volatility scalps, below it makes markets (default: 0.05)
    pub scalping_min_volatility: f64,
    /// Strategy active before the first switch (default: mean_reversion)
    pub initial_strategy: StrategyId,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            hysteresis_secs: 300,
            min_trend_strength: 0.25,
            grid_max_volatility: 0.01,
            min_liquidity: 1.0,
            scalping_min_volatility: 0.05,
            initial_strategy: StrategyId::MeanReversion,
        }
    }
}

impl SelectorConfig {
    pub fn with_hysteresis_secs(mut self, secs: i64) -> Self {
        self.hysteresis_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range(
            "selector",
            "hysteresis_secs",
            self.hysteresis_secs as f64,
            0.0,
            f64::MAX,
        )?;
        ConfigError::check_range("selector", "min_trend_strength", self.min_trend_strength, 0.0, 1.0)?;
        Ok(())
    }

    /// Regime → preferred strategy, first match wins
    pub fn select_optimal(&self, condition: &MarketCondition) -> StrategyId {
        match condition.regime {
            Regime::Trending if condition.trend_strength >= self.min_trend_strength => {
                StrategyId::TrendFollowing
            }
            Regime::Ranging if condition.volatility < self.grid_max_volatility => {
                StrategyId::GridDca
            }
            Regime::Ranging => StrategyId::MeanReversion,
            Regime::Volatile
                if condition.liquidity >= self.min_liquidity
                    && condition.volatility >= self.scalping_min_volatility =>
            {
                StrategyId::Scalping
            }
            Regime::Volatile if condition.liquidity >= self.min_liquidity => {
                StrategyId::MarketMaking
            }
            Regime::Illiquid => StrategyId::GridDca,
            _ => StrategyId::MeanReversion,
        }
    }
}

pub struct HybridManager {
    config: SelectorConfig,
    classifier: RegimeClassifier,
    book: StrategyBook,
    risk: RiskManager,
    current: StrategyId,
    last_switch: Option<DateTime<Utc>>,
    /// Time of the first analysis since construction or reset
    first_seen: Option<DateTime<Utc>>,
    last_condition: Option<MarketCondition>,
    symbol: Symbol,
    recorder: Arc<dyn DecisionRecorder>,
}

impl HybridManager {
    pub fn new(config: &Config, recorder: Arc<dyn DecisionRecorder>) -> Self {
        Self::from_parts(
            config.selector.clone(),
            config.regime.clone(),
            &config.strategies,
            config.risk.clone(),
            config.account.initial_balance,
            config.account.symbol(),
            recorder,
        )
    }

    pub fn from_parts(
        selector: SelectorConfig,
        regime: RegimeConfig,
        strategies: &StrategiesConfig,
        risk: RiskConfig,
        balance: f64,
        symbol: Symbol,
        recorder: Arc<dyn DecisionRecorder>,
    ) -> Self {
        let current = selector.initial_strategy;
        Self {
            config: selector,
            classifier: RegimeClassifier::new(regime),
            book: StrategyBook::from_config(strategies, balance),
            risk: risk.build(balance),
            current,
            last_switch: None,
            first_seen: None,
            last_condition: None,
            symbol,
            recorder,
        }
    }

    pub fn current_strategy(&self) -> StrategyId {
        self.current
    }

    pub fn last_switch(&self) -> Option<DateTime<Utc>> {
        self.last_switch
    }

    pub fn last_condition(&self) -> Option<&MarketCondition> {
        self.last_condition.as_ref()
    }

    pub fn risk_state(&self) -> &RiskState {
        self.risk.state()
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn select_optimal(&self, condition: &MarketCondition) -> StrategyId {
        self.config.select_optimal(condition)
    }

    pub fn strategy(&self, id: StrategyId) -> Option<&dyn Strategy> {
        self.book.get(id)
    }

    pub fn strategy_mut(&mut self, id: StrategyId) -> Option<&mut Box<dyn Strategy>> {
        self.book.get_mut(id)
    }

    /// Analyze at the newest candle's time
    pub fn analyze(&mut self, candles: &[Candle], snapshot: Option<&MarketSnapshot>) -> Signal {
        let now = candles
            .last()
            .map(|c| c.datetime)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        self.analyze_at(candles, snapshot, now)
    }

    pub fn analyze_at(
        &mut self,
        candles: &[Candle],
        snapshot: Option<&MarketSnapshot>,
        now: DateTime<Utc>,
    ) -> Signal {
        let price = candles.last_close().unwrap_or(0.0);
        let condition = self.classifier.classify(candles);
        self.last_condition = Some(condition);
        let switch_allowed = self.hysteresis_elapsed(now);
        self.first_seen.get_or_insert(now);

        if self.risk.should_stop() {
            debug!(symbol = %self.symbol, "trading halted, skipping strategies");
            let signal = self
                .risk
                .stop_signal(Signal::hold(self.current, price, String::new()));
            return annotate(signal, &condition);
        }

        let optimal = self.config.select_optimal(&condition);
        if optimal != self.current && switch_allowed {
            self.switch_to(optimal, candles, &condition, now, "regime change");
        }

        let signal = match self.book.get_mut(self.current) {
            Some(strategy) => strategy.analyze(candles, snapshot),
            None => Signal::hold(self.current, price, "Strategy not registered"),
        };

        let (signal, actions) = self.risk.apply(signal, &condition);
        if actions.contains(&RiskAction::Halted) {
            let state = self.risk.state();
            self.recorder.record(&LogRecord::Risk {
                timestamp: now,
                symbol: self.symbol.clone(),
                should_stop: state.should_stop,
                current_drawdown: state.current_drawdown,
                daily_loss: state.daily_loss,
                message: "Risk limits breached, trading halted".to_string(),
            });
        }

        let signal = annotate(signal, &condition);
        debug!(
            symbol = %self.symbol,
            strategy = %self.current,
            regime = %condition.regime,
            action = %signal.action,
            confidence = signal.confidence,
            "cycle complete"
        );
        signal
    }

    /// The very first analysis may switch at once; after that the delay runs
    /// from the last switch, or from the first analysis if none happened yet
    fn hysteresis_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_switch.or(self.first_seen) {
            None => true,
            Some(since) => now - since >= Duration::seconds(self.config.hysteresis_secs),
        }
    }

    fn switch_to(
        &mut self,
        next: StrategyId,
        candles: &[Candle],
        condition: &MarketCondition,
        now: DateTime<Utc>,
        why: &str,
    ) {
        let from = self.current;
        info!(
            symbol = %self.symbol,
            from = %from,
            to = %next,
            regime = %condition.regime,
            "switching strategy"
        );
        self.current = next;
        self.last_switch = Some(now);
        if let Some(strategy) = self.book.get_mut(next) {
            strategy.activate(candles);
        }
        self.recorder.record(&LogRecord::Decision {
            timestamp: now,
            symbol: self.symbol.clone(),
            from: Some(from),
            strategy: next,
            regime: condition.regime,
            action: crate::SignalAction::Hold,
            confidence: condition.confidence,
            risk_level: RiskLevel::assess(condition.confidence, condition.regime),
            reason: format!("{}: {} -> {} in {} market", why, from, next, condition.regime),
        });
    }

    /// Switch immediately, ignoring hysteresis
    pub fn force_strategy(&mut self, id: StrategyId, candles: &[Candle], now: DateTime<Utc>) {
        if id == self.current {
            return;
        }
        let condition = self
            .last_condition
            .unwrap_or_else(|| self.classifier.classify(candles));
        self.switch_to(id, candles, &condition, now, "manual override");
    }

    /// Book a closed trade's P&L and propagate the new balance to sizing
    pub fn record_trade_result(&mut self, pnl: f64) {
        self.risk.record_trade(pnl);
        let balance = self.risk.state().balance;
        self.book.set_balance(balance);
    }

    pub fn update_balance(&mut self, balance: f64) {
        self.risk.update_balance(balance);
        self.book.set_balance(balance);
    }

    pub fn set_position_size(&mut self, notional: f64) {
        self.risk.set_position_size(notional);
    }

    /// Forward a fill to the strategy that requested it
    pub fn on_fill(&mut self, strategy: StrategyId, side: Side, quantity: f64, price: f64) {
        if let Some(s) = self.book.get_mut(strategy) {
            s.on_fill(side, quantity, price);
        }
    }

    pub fn reset_daily(&mut self) {
        self.risk.reset_daily();
    }

    /// Fresh account: risk state, strategy state and switch timer all start over
    pub fn reset_account(&mut self, balance: f64) {
        self.risk.reset_account(balance);
        self.book.reset_all();
        self.book.set_balance(balance);
        self.current = self.config.initial_strategy;
        self.last_switch = None;
        self.first_seen = None;
        self.last_condition = None;
    }
}

fn annotate(mut signal: Signal, condition: &MarketCondition) -> Signal {
    signal.regime = Some(condition.regime);
    signal.risk_level = Some(RiskLevel::assess(signal.confidence, condition.regime));
    signal
}

impl std::fmt::Debug for HybridManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridManager")
            .field("symbol", &self.symbol)
            .field("current", &self.current)
            .field("last_switch", &self.last_switch)
            .field("risk", self.risk.state())
            .finish()
    }
}
