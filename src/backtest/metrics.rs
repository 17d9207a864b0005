//! Performance metrics
//!
//! Everything here is a pure function of the closed trades and the starting
//! balance. Percentages follow the summary convention: `total_return`,
//! `max_drawdown` and `win_rate` are in percent, ratios are plain numbers.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use super::{ExitReason, TradeRecord};
use crate::strategies::StrategyId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_return: f64,
    /// Peak-to-trough on the cumulative P&L equity line
    pub max_drawdown: f64,
    /// Mean over sample standard deviation of per-trade returns
    pub sharpe_ratio: f64,
    pub calmar_ratio: f64,
    /// Gross profit over gross loss; infinite with profits and no losses,
    /// written as `null` in JSON
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub avg_hold_secs: f64,
    pub final_balance: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    pub strategy_usage: BTreeMap<StrategyId, usize>,
}

/// JSON has no infinity: an unbounded ratio travels as `null`
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

pub fn calculate_metrics(trades: &[TradeRecord], initial_balance: f64) -> PerformanceMetrics {
    if trades.is_empty() {
        return PerformanceMetrics {
            final_balance: initial_balance,
            ..PerformanceMetrics::default()
        };
    }

    let (wins, losses): (Vec<&TradeRecord>, Vec<&TradeRecord>) =
        trades.iter().partition(|t| t.profit > 0.0);

    let gross_profits: f64 = wins.iter().map(|t| t.profit).sum();
    let gross_losses: f64 = losses.iter().map(|t| t.profit.abs()).sum();
    let net: f64 = trades.iter().map(|t| t.profit).sum();
    let final_balance = initial_balance + net;

    let total_return = if initial_balance > 0.0 {
        net / initial_balance * 100.0
    } else {
        0.0
    };

    let profit_factor = if gross_losses > 0.0 {
        gross_profits / gross_losses
    } else if gross_profits > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let max_dd = max_drawdown(initial_balance, trades);
    let calmar_ratio = if max_dd > 0.0 {
        (total_return / 100.0) / max_dd
    } else {
        0.0
    };

    PerformanceMetrics {
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate: wins.len() as f64 / trades.len() as f64 * 100.0,
        total_return,
        max_drawdown: max_dd * 100.0,
        sharpe_ratio: sharpe_ratio(trades),
        calmar_ratio,
        profit_factor,
        avg_win: if wins.is_empty() {
            0.0
        } else {
            gross_profits / wins.len() as f64
        },
        avg_loss: if losses.is_empty() {
            0.0
        } else {
            gross_losses / losses.len() as f64
        },
        largest_win: wins.iter().map(|t| t.profit).fold(0.0, f64::max),
        largest_loss: losses.iter().map(|t| t.profit).fold(0.0, f64::min),
        total_fees: trades.iter().map(|t| t.fees).sum(),
        avg_hold_secs: trades.iter().map(|t| t.hold_secs as f64).sum::<f64>() / trades.len() as f64,
        final_balance,
        exit_reasons: trades.iter().map(|t| t.exit_reason).counts().into_iter().collect(),
        strategy_usage: trades.iter().map(|t| t.strategy).counts().into_iter().collect(),
    }
}

/// Largest fractional decline from a running peak of
/// `initial_balance + cumulative profit`
pub fn max_drawdown(initial_balance: f64, trades: &[TradeRecord]) -> f64 {
    let mut equity = initial_balance;
    let mut peak = initial_balance;
    let mut max_dd: f64 = 0.0;

    for trade in trades {
        equity += trade.profit;
        peak = peak.max(equity);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }

    max_dd
}

/// Per-trade Sharpe, not annualized. Zero with fewer than two trades or no
/// dispersion.
pub fn sharpe_ratio(trades: &[TradeRecord]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = trades.iter().map(TradeRecord::return_pct).collect();
    let mean = returns.iter().copied().mean();
    let std_dev = returns.iter().copied().std_dev();
    if std_dev > 0.0 && std_dev.is_finite() {
        mean / std_dev
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Side;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn trade(profit: f64, reason: ExitReason) -> TradeRecord {
        let entry_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TradeRecord {
            strategy: StrategyId::TrendFollowing,
            side: Side::Buy,
            entry_time,
            exit_time: entry_time + Duration::hours(2),
            entry_price: 100.0,
            exit_price: 100.0 + profit,
            quantity: 1.0,
            profit,
            fees: 0.2,
            hold_secs: 7_200,
            exit_reason: reason,
        }
    }

    #[test]
    fn test_no_trades() {
        let metrics = calculate_metrics(&[], 1_000.0);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.final_balance, 1_000.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_mixed_trades() {
        let trades = vec![
            trade(30.0, ExitReason::TakeProfit),
            trade(-10.0, ExitReason::StopLoss),
            trade(20.0, ExitReason::TakeProfit),
            trade(-20.0, ExitReason::Timeout),
        ];
        let m = calculate_metrics(&trades, 1_000.0);

        assert_eq!(m.total_trades, 4);
        assert_eq!(m.winning_trades, 2);
        assert_relative_eq!(m.win_rate, 50.0);
        assert_relative_eq!(m.total_return, 2.0, epsilon = 1e-12);
        assert_relative_eq!(m.profit_factor, 50.0 / 30.0);
        assert_relative_eq!(m.avg_win, 25.0);
        assert_relative_eq!(m.avg_loss, 15.0);
        assert_relative_eq!(m.largest_loss, -20.0);
        assert_relative_eq!(m.total_fees, 0.8, epsilon = 1e-12);
        assert_relative_eq!(m.avg_hold_secs, 7_200.0);
        assert_eq!(m.exit_reasons[&ExitReason::TakeProfit], 2);
        assert_eq!(m.strategy_usage[&StrategyId::TrendFollowing], 4);

        // peak 1040 after the third trade, trough 1020 after the fourth
        assert_relative_eq!(m.max_drawdown, 20.0 / 1_040.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(m.calmar_ratio, 0.02 / (20.0 / 1_040.0), epsilon = 1e-9);
        assert!(m.sharpe_ratio > 0.0);
    }

    #[test]
    fn test_only_winners_has_infinite_profit_factor() {
        let trades = vec![trade(5.0, ExitReason::TakeProfit), trade(5.0, ExitReason::TakeProfit)];
        let m = calculate_metrics(&trades, 1_000.0);
        assert!(m.profit_factor.is_infinite());
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.calmar_ratio, 0.0);
        // identical returns have no dispersion
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_summary_json_keeps_unbounded_profit_factor() {
        let trades = vec![trade(5.0, ExitReason::TakeProfit)];
        let m = calculate_metrics(&trades, 1_000.0);

        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"profit_factor\":null"));
        let back: PerformanceMetrics = serde_json::from_str(&json).unwrap();
        assert!(back.profit_factor.is_infinite());
        assert_eq!(back, m);

        let mixed = calculate_metrics(
            &[trade(5.0, ExitReason::TakeProfit), trade(-2.0, ExitReason::StopLoss)],
            1_000.0,
        );
        let back: PerformanceMetrics =
            serde_json::from_str(&serde_json::to_string(&mixed).unwrap()).unwrap();
        assert_relative_eq!(back.profit_factor, 2.5);
    }
}
