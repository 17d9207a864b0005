//! Technical indicators
//!
//! Moving averages, MACD, Bollinger Bands and Stochastic are wrappers around the
//! `ta` crate. RSI, ATR and ADX are computed here because their smoothing
//! differs from what `ta` ships (Wilder RSI, SMA-based ATR, Wilder DMI).
//!
//! Two layers:
//! - series functions return `Vec<Option<f64>>` aligned with the input, `None`
//!   during warm-up
//! - `*_last` helpers return the most recent value and fall back to a neutral
//!   default (RSI 50, ADX 0, ATR 0) when the window is shorter than the period.
//!   Every caller relies on this single insufficient-data policy.

use ta::indicators::{
    BollingerBands as TaBB, ExponentialMovingAverage, FastStochastic,
    MovingAverageConvergenceDivergence, SimpleMovingAverage,
};
use ta::{DataItem, Next};

/// Type alias for band indicators (upper, middle, lower)
pub type BandOutput = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

/// Type alias for two-line indicators (line1, line2)
pub type DualLineOutput = (Vec<Option<f64>>, Vec<Option<f64>>);

/// Neutral RSI returned for short or flat windows
pub const NEUTRAL_RSI: f64 = 50.0;

/// Create a DataItem from OHLCV data for use with ta indicators
fn make_data_item(high: f64, low: f64, close: f64) -> Option<DataItem> {
    DataItem::builder()
        .open(close)
        .high(high)
        .low(low)
        .close(close)
        .volume(0.0)
        .build()
        .ok()
}

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let sma_val = indicator.next(value);
            (i + 1 >= period).then_some(sma_val)
        })
        .collect()
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let ema_val = indicator.next(value);
            (i + 1 >= period).then_some(ema_val)
        })
        .collect()
}

/// Latest EMA value, or `None` when the window is shorter than the period
pub fn ema_last(values: &[f64], period: usize) -> Option<f64> {
    ema(values, period).last().copied().flatten()
}

/// Mean of the trailing `period` values (all values when fewer are available)
pub fn trailing_mean(values: &[f64], period: usize) -> f64 {
    if values.is_empty() || period == 0 {
        return 0.0;
    }
    let start = values.len().saturating_sub(period);
    let window = &values[start..];
    window.iter().sum::<f64>() / window.len() as f64
}

/// Highest value in the trailing `period` values
pub fn highest(values: &[f64], period: usize) -> Option<f64> {
    let start = values.len().saturating_sub(period);
    values[start..].iter().copied().reduce(f64::max)
}

/// Lowest value in the trailing `period` values
pub fn lowest(values: &[f64], period: usize) -> Option<f64> {
    let start = values.len().saturating_sub(period);
    values[start..].iter().copied().reduce(f64::min)
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI with Wilder smoothing
///
/// The first average gain/loss is the simple mean of the first `period`
/// changes; afterwards `avg = (prev * (period - 1) + current) / period`.
/// Values are available from index `period` (one change per bar).
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut result = vec![None; values.len()];
    if values.len() <= period {
        return result;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return NEUTRAL_RSI;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Latest RSI value; exactly 50 when history length <= period
pub fn rsi_last(values: &[f64], period: usize) -> f64 {
    rsi(values, period)
        .last()
        .copied()
        .flatten()
        .unwrap_or(NEUTRAL_RSI)
}

/// MACD line, signal line and histogram at one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Calculate MACD using ta crate
///
/// MACD = EMA(fast) - EMA(slow), signal = EMA(MACD, signal_period).
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> BandOutput {
    if values.is_empty() {
        return (vec![], vec![], vec![]);
    }

    let mut indicator =
        match MovingAverageConvergenceDivergence::new(fast_period, slow_period, signal_period) {
            Ok(i) => i,
            Err(_) => {
                return (
                    vec![None; values.len()],
                    vec![None; values.len()],
                    vec![None; values.len()],
                )
            }
        };

    let warmup = slow_period;
    let mut macd_line = Vec::with_capacity(values.len());
    let mut signal_line = Vec::with_capacity(values.len());
    let mut histogram = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let out = indicator.next(value);
        if i + 1 >= warmup {
            macd_line.push(Some(out.macd));
            signal_line.push(Some(out.signal));
            histogram.push(Some(out.histogram));
        } else {
            macd_line.push(None);
            signal_line.push(None);
            histogram.push(None);
        }
    }

    (macd_line, signal_line, histogram)
}

/// Latest MACD reading, or `None` before the slow EMA has warmed up
pub fn macd_last(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    let (line, signal, histogram) = macd(values, fast_period, slow_period, signal_period);
    Some(MacdValue {
        macd: line.last().copied().flatten()?,
        signal: signal.last().copied().flatten()?,
        histogram: histogram.last().copied().flatten()?,
    })
}

/// Calculate Stochastic Oscillator using ta crate
/// Returns (%K, %D) where %D is SMA of %K
pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
) -> DualLineOutput {
    if high.is_empty() || high.len() != low.len() || high.len() != close.len() {
        return (vec![], vec![]);
    }

    let mut fast_stoch = match FastStochastic::new(k_period) {
        Ok(i) => i,
        Err(_) => return (vec![None; high.len()], vec![None; high.len()]),
    };

    let mut k_values = Vec::with_capacity(high.len());
    let mut raw_k = Vec::new();

    for i in 0..high.len() {
        let k_val = match make_data_item(high[i], low[i], close[i]) {
            Some(item) => fast_stoch.next(&item),
            None => {
                k_values.push(None);
                continue;
            }
        };
        if i + 1 >= k_period {
            k_values.push(Some(k_val));
            raw_k.push(k_val);
        } else {
            k_values.push(None);
        }
    }

    let d_sma = sma(&raw_k, d_period);
    let padding = high.len() - d_sma.len();
    let mut d_values: Vec<Option<f64>> = vec![None; padding];
    d_values.extend(d_sma);

    (k_values, d_values)
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Calculate Average True Range as the simple mean of the last `period` true ranges
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    if high.is_empty() || period == 0 || high.len() != low.len() || high.len() != close.len() {
        return vec![];
    }

    let tr = true_range(high, low, close);
    let mut result = Vec::with_capacity(tr.len());
    let mut window_sum = 0.0;

    for i in 0..tr.len() {
        window_sum += tr[i];
        if i >= period {
            window_sum -= tr[i - period];
        }
        if i + 1 >= period {
            result.push(Some(window_sum / period as f64));
        } else {
            result.push(None);
        }
    }

    result
}

/// Latest ATR value; 0 when the window is shorter than the period
pub fn atr_last(high: &[f64], low: &[f64], close: &[f64], period: usize) -> f64 {
    atr(high, low, close, period)
        .last()
        .copied()
        .flatten()
        .unwrap_or(0.0)
}

/// Bollinger Bands at one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands using ta crate: SMA(period) ± k·stddev(period)
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> BandOutput {
    if values.is_empty() || period == 0 {
        return (vec![], vec![], vec![]);
    }

    let mut indicator = match TaBB::new(period, num_std) {
        Ok(i) => i,
        Err(_) => {
            return (
                vec![None; values.len()],
                vec![None; values.len()],
                vec![None; values.len()],
            )
        }
    };

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let bb = indicator.next(value);
        if i + 1 >= period {
            upper.push(Some(bb.upper));
            middle.push(Some(bb.average));
            lower.push(Some(bb.lower));
        } else {
            upper.push(None);
            middle.push(None);
            lower.push(None);
        }
    }

    (upper, middle, lower)
}

/// Latest Bollinger Bands, or `None` before warm-up
pub fn bollinger_last(values: &[f64], period: usize, num_std: f64) -> Option<Bands> {
    let (upper, middle, lower) = bollinger_bands(values, period, num_std);
    Some(Bands {
        upper: upper.last().copied().flatten()?,
        middle: middle.last().copied().flatten()?,
        lower: lower.last().copied().flatten()?,
    })
}

// =============================================================================
// Trend Indicators
// =============================================================================

/// Apply Wilder's smoothing to a series
/// Wilder's smoothing: new_value = (prev_value * (period - 1) + current) / period
fn wilders_smooth(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut result = Vec::with_capacity(values.len());
    let mut smoothed: Option<f64> = None;

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else if i + 1 == period {
            let sum: f64 = values[0..period].iter().sum();
            smoothed = Some(sum / period as f64);
            result.push(smoothed);
        } else if let Some(prev) = smoothed {
            let new_val = (prev * (period - 1) as f64 + values[i]) / period as f64;
            smoothed = Some(new_val);
            result.push(smoothed);
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate Directional Movement Index components using Wilder's smoothing
/// Returns (+DI, -DI), aligned with the input bars
pub fn dmi(high: &[f64], low: &[f64], close: &[f64], period: usize) -> DualLineOutput {
    let n = high.len();
    if n < 2 || period == 0 || n != low.len() || n != close.len() {
        return (vec![None; n], vec![None; n]);
    }

    // One entry per move (bar i relative to bar i - 1)
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);
    let mut tr = Vec::with_capacity(n - 1);

    for i in 1..n {
        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });

        let hl = high[i] - low[i];
        let hc = (high[i] - close[i - 1]).abs();
        let lc = (low[i] - close[i - 1]).abs();
        tr.push(hl.max(hc).max(lc));
    }

    let smoothed_plus = wilders_smooth(&plus_dm, period);
    let smoothed_minus = wilders_smooth(&minus_dm, period);
    let smoothed_tr = wilders_smooth(&tr, period);

    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];

    for j in 0..tr.len() {
        if let (Some(pdm), Some(mdm), Some(str_val)) =
            (smoothed_plus[j], smoothed_minus[j], smoothed_tr[j])
        {
            if str_val > 0.0 {
                plus_di[j + 1] = Some(pdm / str_val * 100.0);
                minus_di[j + 1] = Some(mdm / str_val * 100.0);
            } else {
                plus_di[j + 1] = Some(0.0);
                minus_di[j + 1] = Some(0.0);
            }
        }
    }

    (plus_di, minus_di)
}

/// Directional trend strength: |+DI − −DI| / (+DI + −DI) × 100
///
/// Built on Wilder-smoothed directional movement; available once `period`
/// moves (period + 1 bars) exist.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let (plus_di, minus_di) = dmi(high, low, close, period);

    plus_di
        .iter()
        .zip(minus_di.iter())
        .map(|(p, m)| match (p, m) {
            (Some(p), Some(m)) => {
                let sum = p + m;
                Some(if sum > 0.0 {
                    (p - m).abs() / sum * 100.0
                } else {
                    0.0
                })
            }
            _ => None,
        })
        .collect()
}

/// Latest ADX value; 0 when the window is shorter than period + 1 bars
pub fn adx_last(high: &[f64], low: &[f64], close: &[f64], period: usize) -> f64 {
    adx(high, low, close, period)
        .last()
        .copied()
        .flatten()
        .unwrap_or(0.0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3);

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(result[3].unwrap(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(result[4].unwrap(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ema() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = ema(&values, 3);

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        let ema_val = result[4].unwrap();
        assert!(ema_val > 3.0 && ema_val < 5.0);
    }

    #[test]
    fn test_rsi_flat_series_is_neutral() {
        let values = vec![100.0; 20];
        assert_eq!(rsi_last(&values, 14), 50.0);
    }

    #[test]
    fn test_rsi_short_history_is_neutral() {
        let values: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi_last(&values, 14), 50.0);

        let values: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!(rsi_last(&values, 14) > 50.0);
    }

    #[test]
    fn test_rsi_monotonic_increase_is_bullish() {
        let values: Vec<f64> = (0..16).map(|i| 100.0 + i as f64).collect();
        let value = rsi_last(&values, 14);
        assert!(value > 50.0);
        assert_eq!(value, 100.0);
    }

    #[test]
    fn test_rsi_known_values() {
        // Wilder's worked example
        let values = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28,
        ];
        let value = rsi_last(&values, 14);
        assert_relative_eq!(value, 70.53, epsilon = 0.05);
    }

    #[test]
    fn test_macd() {
        let values: Vec<f64> = (1..=50).map(|x| x as f64).collect();
        let out = macd_last(&values, 12, 26, 9).unwrap();

        assert!(out.macd > 0.0);
        assert_relative_eq!(out.histogram, out.macd - out.signal, epsilon = 1e-9);
        assert!(macd_last(&values[..10], 12, 26, 9).is_none());
    }

    #[test]
    fn test_stochastic() {
        let high = vec![5.0, 6.0, 7.0, 8.0, 9.0, 8.0, 7.0, 8.0, 9.0, 10.0];
        let low = vec![4.0, 5.0, 6.0, 7.0, 8.0, 7.0, 6.0, 7.0, 8.0, 9.0];
        let close = vec![4.5, 5.5, 6.5, 7.5, 8.5, 7.5, 6.5, 7.5, 8.5, 9.5];

        let (k, d) = stochastic(&high, &low, &close, 5, 3);

        let k_val = k.last().unwrap().unwrap();
        assert!(d.last().unwrap().is_some());
        assert!((0.0..=100.0).contains(&k_val));
    }

    #[test]
    fn test_bollinger_bands() {
        let values = vec![20.0, 21.0, 22.0, 21.0, 20.0, 21.0, 22.0, 23.0, 22.0, 21.0];
        let bands = bollinger_last(&values, 5, 2.0).unwrap();

        assert!(bands.upper > bands.middle);
        assert!(bands.middle > bands.lower);
        assert_relative_eq!(bands.middle, 21.8, epsilon = 1e-9);
    }

    #[test]
    fn test_atr_is_mean_true_range() {
        let high = vec![10.0, 11.0, 12.0, 11.5, 12.0];
        let low = vec![9.0, 10.0, 11.0, 10.5, 11.0];
        let close = vec![9.5, 10.5, 11.5, 11.0, 11.5];

        let result = atr(&high, &low, &close, 3);
        assert_eq!(result[1], None);

        let tr = true_range(&high, &low, &close);
        let expected = (tr[2] + tr[3] + tr[4]) / 3.0;
        assert_relative_eq!(result[4].unwrap(), expected, epsilon = 1e-12);
        assert_eq!(atr_last(&high[..2], &low[..2], &close[..2], 3), 0.0);
    }

    #[test]
    fn test_adx_strong_uptrend() {
        let high: Vec<f64> = (0..40).map(|i| 101.0 + i as f64).collect();
        let low: Vec<f64> = (0..40).map(|i| 99.0 + i as f64).collect();
        let close: Vec<f64> = (0..40).map(|i| 100.5 + i as f64).collect();

        let value = adx_last(&high, &low, &close, 14);
        assert!(value > 90.0, "pure uptrend should be strongly directional, got {}", value);
    }

    #[test]
    fn test_adx_insufficient_data_is_zero() {
        let high = vec![10.0; 10];
        let low = vec![9.0; 10];
        let close = vec![9.5; 10];
        assert_eq!(adx_last(&high, &low, &close, 14), 0.0);
    }

    #[test]
    fn test_highest_lowest_mean() {
        let values = vec![3.0, 9.0, 1.0, 4.0, 5.0];
        assert_eq!(highest(&values, 3), Some(5.0));
        assert_eq!(lowest(&values, 3), Some(1.0));
        assert_relative_eq!(trailing_mean(&values, 2), 4.5);
        assert_eq!(highest(&[], 3), None);
    }
}
