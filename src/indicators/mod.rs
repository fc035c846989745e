//! Feature extractor: price-series transforms shared by every heuristic.
//!
//! All functions are pure over slices. Insufficient history yields `None`
//! or an empty result rather than an error.

pub mod candles;
pub mod digits;
pub mod market;

use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

use crate::types::PriceBar;

// ---------------------------------------------------------------------------
// Moving averages
// ---------------------------------------------------------------------------

/// Mean of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    sma_series(&values[values.len() - period..], period)
        .last()
        .copied()
        .flatten()
}

/// Rolling SMA aligned with the input; leading entries are `None`.
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let Ok(mut average) = SimpleMovingAverage::new(period) else {
        return vec![None; values.len()];
    };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let mean = average.next(*v);
            (i + 1 >= period).then_some(mean)
        })
        .collect()
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the
/// first value.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let Ok(mut average) = ExponentialMovingAverage::new(span.max(1)) else {
        return Vec::new();
    };
    values.iter().map(|v| average.next(*v)).collect()
}

/// Latest value of [`ema_series`].
pub fn ema(values: &[f64], span: usize) -> Option<f64> {
    ema_series(values, span).last().copied()
}

// ---------------------------------------------------------------------------
// Momentum and volatility
// ---------------------------------------------------------------------------

/// Relative Strength Index with Wilder smoothing.
///
/// Needs `period + 1` closes. Returns 100 when there are no losses in the
/// window (50 when there is no movement at all).
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let (mut avg_gain, mut avg_loss) = changes[..period].iter().fold((0.0, 0.0), |(g, l), c| {
        if *c > 0.0 {
            (g + c, l)
        } else {
            (g, l - c)
        }
    });
    avg_gain /= p;
    avg_loss /= p;

    for c in &changes[period..] {
        let gain = c.max(0.0);
        let loss = (-c).max(0.0);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Average true range over the last `period` bars. Needs `period + 1` bars.
pub fn atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let start = bars.len() - period;
    let total: f64 = (start..bars.len())
        .map(|i| {
            let bar = &bars[i];
            let prev_close = bars[i - 1].close;
            bar.range()
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .sum();
    Some(total / period as f64)
}

/// Sample standard deviation of simple returns over the last `window` returns.
pub fn returns_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window + 1 {
        return None;
    }
    let tail = &closes[closes.len() - window - 1..];
    let returns: Vec<f64> = tail
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

// ---------------------------------------------------------------------------
// Swing points
// ---------------------------------------------------------------------------

/// Indices of local extrema found by [`swing_points`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwingPoints {
    pub highs: Vec<usize>,
    pub lows: Vec<usize>,
}

/// Detect swing highs/lows with a symmetric lookback.
///
/// Index `i` is a swing high iff `values[i]` is strictly greater than every
/// one of the `window` values on each side; swing lows mirror this.
pub fn swing_points(values: &[f64], window: usize) -> SwingPoints {
    let mut points = SwingPoints::default();
    if window == 0 || values.len() < 2 * window {
        return points;
    }

    for i in window..values.len().saturating_sub(window) {
        let v = values[i];
        let left = &values[i - window..i];
        let right = &values[i + 1..=i + window];
        let neighbours = || left.iter().chain(right.iter());

        let max = neighbours().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = neighbours().cloned().fold(f64::INFINITY, f64::min);

        if v > max {
            points.highs.push(i);
        }
        if v < min {
            points.lows.push(i);
        }
    }
    points
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Aggregate consecutive groups of `factor` bars into one bar each.
///
/// Groups are anchored at the newest bar, so the last aggregated close is
/// always the latest input close. A leading partial group is dropped.
pub fn resample(bars: &[PriceBar], factor: usize) -> Vec<PriceBar> {
    if factor <= 1 {
        return bars.to_vec();
    }
    let skip = bars.len() % factor;
    bars[skip..]
        .chunks_exact(factor)
        .map(|group| {
            let first = group[0];
            let last = group[group.len() - 1];
            PriceBar {
                timestamp: first.timestamp,
                open: first.open,
                high: group.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
                low: group.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
                close: last.close,
            }
        })
        .collect()
}

/// Close prices of a bar slice.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
