//! Risk management gate
//!
//! Tracks drawdown, daily loss and open position size, and filters every
//! signal before it leaves the selector. Rules, applied in order:
//!
//! 1. regime VOLATILE → quantity × `volatile_size_factor` (0.7)
//! 2. drawdown ≥ max or daily loss ≥ max → HOLD, confidence 0, `should_stop`
//! 3. position clamp: `quantity × entry ≤ max_position_size − position_size`;
//!    a clamp to zero turns the signal into HOLD
//!
//! `should_stop` is sticky. Only [`RiskState::reset_daily`] (new trading day
//! or manual reset) and [`RiskState::reset_account`] clear it; drawdown itself
//! survives a daily reset.
//!
//! # Currency-Agnostic Design
//!
//! Balances, losses and position sizes are plain numbers in the quote
//! currency of the price data. Drawdown limits are fractions of peak balance,
//! daily loss and position limits are fractions of balance.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::{MarketCondition, Regime, Signal, SignalAction};

/// Configuration for RiskManager using builder pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Halt when drawdown from peak reaches this fraction (default: 0.15)
    pub max_drawdown: f64,
    /// Halt when the day's realized loss reaches this fraction of the day's opening balance (default: 0.05)
    pub max_daily_loss: f64,
    /// Largest open position notional as a fraction of balance (default: 0.5)
    pub max_position_size: f64,
    /// Quantity multiplier in VOLATILE markets (default: 0.7)
    pub volatile_size_factor: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown: 0.15,
            max_daily_loss: 0.05,
            max_position_size: 0.5,
            volatile_size_factor: 0.7,
        }
    }
}

impl RiskConfig {
    /// Set maximum drawdown threshold for halting
    pub fn with_max_drawdown(mut self, dd: f64) -> Self {
        self.max_drawdown = dd;
        self
    }

    /// Set maximum daily loss as a fraction of balance
    pub fn with_max_daily_loss(mut self, loss: f64) -> Self {
        self.max_daily_loss = loss;
        self
    }

    /// Set maximum position notional as a fraction of balance
    pub fn with_max_position_size(mut self, size: f64) -> Self {
        self.max_position_size = size;
        self
    }

    /// Set the VOLATILE regime quantity multiplier
    pub fn with_volatile_size_factor(mut self, factor: f64) -> Self {
        self.volatile_size_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range("risk", "max_drawdown", self.max_drawdown, f64::EPSILON, 1.0)?;
        ConfigError::check_range("risk", "max_daily_loss", self.max_daily_loss, f64::EPSILON, 1.0)?;
        ConfigError::check_positive("risk", "max_position_size", self.max_position_size)?;
        ConfigError::check_range(
            "risk",
            "volatile_size_factor",
            self.volatile_size_factor,
            0.0,
            1.0,
        )?;
        Ok(())
    }

    /// Build the RiskManager
    pub fn build(self, initial_balance: f64) -> RiskManager {
        RiskManager::new(self, initial_balance)
    }
}

/// Risk bookkeeping owned by one selector instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Limit, fraction of peak
    pub max_drawdown: f64,
    /// Fraction of peak
    pub current_drawdown: f64,
    /// Realized loss since the last daily reset (quote units)
    pub daily_loss: f64,
    /// Limit (quote units), fixed at the last daily reset
    pub max_daily_loss: f64,
    /// Open position notional (quote units)
    pub position_size: f64,
    /// Limit (quote units)
    pub max_position_size: f64,
    pub peak_balance: f64,
    pub balance: f64,
    pub should_stop: bool,
}

impl RiskState {
    pub fn new(config: &RiskConfig, balance: f64) -> Self {
        Self {
            max_drawdown: config.max_drawdown,
            current_drawdown: 0.0,
            daily_loss: 0.0,
            max_daily_loss: balance * config.max_daily_loss,
            position_size: 0.0,
            max_position_size: balance * config.max_position_size,
            peak_balance: balance,
            balance,
            should_stop: false,
        }
    }

    /// Mark-to-market balance update; tracks peak and drawdown
    pub fn update_balance(&mut self, balance: f64, config: &RiskConfig) {
        self.balance = balance;
        if balance > self.peak_balance {
            self.peak_balance = balance;
        }
        self.current_drawdown = if self.peak_balance > 0.0 {
            ((self.peak_balance - balance) / self.peak_balance).max(0.0)
        } else {
            0.0
        };
        self.max_position_size = balance.max(0.0) * config.max_position_size;
    }

    /// Book a closed trade's P&L
    pub fn record_trade(&mut self, pnl: f64, config: &RiskConfig) {
        if pnl < 0.0 {
            self.daily_loss += -pnl;
        }
        self.update_balance(self.balance + pnl, config);
    }

    pub fn set_position_size(&mut self, notional: f64) {
        self.position_size = notional.max(0.0);
    }

    pub fn limits_breached(&self) -> bool {
        self.current_drawdown >= self.max_drawdown
            || (self.max_daily_loss > 0.0 && self.daily_loss >= self.max_daily_loss)
    }

    /// New trading day: clears daily loss and the halt flag, keeps drawdown
    pub fn reset_daily(&mut self, config: &RiskConfig) {
        self.daily_loss = 0.0;
        self.max_daily_loss = self.balance * config.max_daily_loss;
        self.should_stop = false;
    }

    /// Start over with a fresh balance
    pub fn reset_account(&mut self, balance: f64, config: &RiskConfig) {
        *self = RiskState::new(config, balance);
    }
}

/// What the gate did to a signal, for the risk log
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskAction {
    Passed,
    Attenuated { factor: f64 },
    Clamped { from: f64, to: f64 },
    Blocked,
    Halted,
}

/// Signal gate plus the state it guards
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
}

impl RiskManager {
    pub fn new(config: RiskConfig, initial_balance: f64) -> Self {
        let state = RiskState::new(&config, initial_balance);
        Self { config, state }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn should_stop(&self) -> bool {
        self.state.should_stop
    }

    pub fn update_balance(&mut self, balance: f64) {
        self.state.update_balance(balance, &self.config);
    }

    pub fn record_trade(&mut self, pnl: f64) {
        self.state.record_trade(pnl, &self.config);
    }

    pub fn set_position_size(&mut self, notional: f64) {
        self.state.set_position_size(notional);
    }

    pub fn reset_daily(&mut self) {
        info!("risk manager daily reset");
        self.state.reset_daily(&self.config);
    }

    pub fn reset_account(&mut self, balance: f64) {
        info!(balance, "risk manager account reset");
        self.state.reset_account(balance, &self.config);
    }

    /// Gate a signal. Returns the filtered signal and what was done to it.
    pub fn apply(&mut self, mut signal: Signal, condition: &MarketCondition) -> (Signal, Vec<RiskAction>) {
        let mut actions = Vec::new();

        // 1. volatile markets trade smaller
        if condition.regime == Regime::Volatile && signal.quantity > 0.0 {
            signal.quantity *= self.config.volatile_size_factor;
            signal.reasons.push(format!(
                "Size reduced to {:.0}% in volatile market",
                self.config.volatile_size_factor * 100.0
            ));
            actions.push(RiskAction::Attenuated {
                factor: self.config.volatile_size_factor,
            });
        }

        // 2. hard limits halt trading until an explicit reset
        if self.state.limits_breached() {
            if !self.state.should_stop {
                warn!(
                    drawdown = self.state.current_drawdown,
                    daily_loss = self.state.daily_loss,
                    max_daily_loss = self.state.max_daily_loss,
                    "risk limits breached, halting"
                );
            }
            self.state.should_stop = true;
            signal.action = SignalAction::Hold;
            signal.confidence = 0.0;
            signal.quantity = 0.0;
            signal.reasons.push(format!(
                "Risk limit exceeded: drawdown {:.2}%, daily loss {:.2}",
                self.state.current_drawdown * 100.0,
                self.state.daily_loss
            ));
            actions.push(RiskAction::Halted);
            return (signal, actions);
        }

        // 3. position size clamp for new directional exposure
        if matches!(signal.action, SignalAction::Buy | SignalAction::Sell)
            && signal.quantity > 0.0
            && signal.entry_price > 0.0
        {
            let room = (self.state.max_position_size - self.state.position_size).max(0.0);
            let notional = signal.quantity * signal.entry_price;
            if notional > room {
                let clamped = room / signal.entry_price;
                if clamped <= 0.0 {
                    signal.action = SignalAction::Hold;
                    signal.quantity = 0.0;
                    signal.reasons.push("Position limit reached".to_string());
                    actions.push(RiskAction::Blocked);
                } else {
                    signal.reasons.push(format!(
                        "Quantity clamped from {:.6} to {:.6} by position limit",
                        signal.quantity, clamped
                    ));
                    actions.push(RiskAction::Clamped {
                        from: signal.quantity,
                        to: clamped,
                    });
                    signal.quantity = clamped;
                }
            }
        }

        if actions.is_empty() {
            actions.push(RiskAction::Passed);
        }
        (signal, actions)
    }

    /// Signal returned while halted, before any strategy runs
    pub fn stop_signal(&self, mut base: Signal) -> Signal {
        base.action = SignalAction::Hold;
        base.confidence = 0.0;
        base.quantity = 0.0;
        base.reasons = vec![format!(
            "Trading halted by risk manager: drawdown {:.2}%, daily loss {:.2}",
            self.state.current_drawdown * 100.0,
            self.state.daily_loss
        )];
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::StrategyId;
    use approx::assert_relative_eq;

    fn buy(quantity: f64) -> Signal {
        Signal::directional(
            StrategyId::TrendFollowing,
            SignalAction::Buy,
            80.0,
            100.0,
            95.0,
            110.0,
            quantity,
            vec!["test".to_string()],
        )
    }

    fn condition(regime: Regime) -> MarketCondition {
        MarketCondition {
            volatility: 0.01,
            trend_strength: 0.3,
            liquidity: 1.0,
            regime,
            confidence: 70.0,
        }
    }

    #[test]
    fn test_volatile_regime_attenuates() {
        let mut rm = RiskConfig::default().build(10_000.0);
        let (signal, actions) = rm.apply(buy(10.0), &condition(Regime::Volatile));
        assert_relative_eq!(signal.quantity, 7.0);
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(actions, vec![RiskAction::Attenuated { factor: 0.7 }]);
    }

    #[test]
    fn test_drawdown_halts_and_sticks() {
        let mut rm = RiskConfig::default().build(10_000.0);
        rm.update_balance(8_000.0);

        let (signal, actions) = rm.apply(buy(1.0), &condition(Regime::Trending));
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(rm.should_stop());
        assert_eq!(actions, vec![RiskAction::Halted]);

        // recovering the balance does not clear the flag
        rm.update_balance(10_000.0);
        assert!(rm.should_stop());

        // a daily reset does
        rm.reset_daily();
        assert!(!rm.should_stop());
    }

    #[test]
    fn test_daily_loss_halts_until_daily_reset() {
        let mut rm = RiskConfig::default().build(10_000.0);
        rm.record_trade(-300.0);
        rm.record_trade(-250.0);
        assert_relative_eq!(rm.state().daily_loss, 550.0);

        let (signal, _) = rm.apply(buy(1.0), &condition(Regime::Ranging));
        assert_eq!(signal.action, SignalAction::Hold);
        assert!(rm.should_stop());

        rm.reset_daily();
        assert_eq!(rm.state().daily_loss, 0.0);
        // drawdown of 5.5% survives the daily reset
        assert_relative_eq!(rm.state().current_drawdown, 0.055, epsilon = 1e-12);
        let (signal, _) = rm.apply(buy(1.0), &condition(Regime::Ranging));
        assert_eq!(signal.action, SignalAction::Buy);
    }

    #[test]
    fn test_position_clamp() {
        let mut rm = RiskConfig::default().build(10_000.0);
        rm.set_position_size(4_000.0);

        // room is 5000 − 4000 = 1000 → 10 units at 100
        let (signal, actions) = rm.apply(buy(50.0), &condition(Regime::Trending));
        assert_relative_eq!(signal.quantity, 10.0);
        assert!(matches!(actions[0], RiskAction::Clamped { .. }));

        rm.set_position_size(5_000.0);
        let (signal, actions) = rm.apply(buy(1.0), &condition(Regime::Trending));
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(actions, vec![RiskAction::Blocked]);
    }

    #[test]
    fn test_reset_account_clears_drawdown() {
        let mut rm = RiskConfig::default().build(10_000.0);
        rm.update_balance(5_000.0);
        rm.apply(buy(1.0), &condition(Regime::Trending));
        assert!(rm.should_stop());

        rm.reset_account(5_000.0);
        assert_eq!(rm.state().current_drawdown, 0.0);
        assert!(!rm.should_stop());
        assert_relative_eq!(rm.state().peak_balance, 5_000.0);
    }
}
