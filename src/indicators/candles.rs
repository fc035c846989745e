//! Candlestick pattern checks on fixed body/shadow ratios.

use serde::Serialize;

use crate::types::PriceBar;

/// Doji: body under 10% of the high-low range.
pub fn is_doji(bar: &PriceBar) -> bool {
    let range = bar.range();
    range > 0.0 && bar.body() < 0.1 * range
}

/// Hammer: long lower shadow, almost no upper shadow, bullish close.
pub fn is_hammer(bar: &PriceBar) -> bool {
    let body = bar.body();
    body > 0.0
        && bar.lower_shadow() >= 2.0 * body
        && bar.upper_shadow() <= 0.2 * body
        && bar.is_bullish()
}

/// Shooting star: the bearish mirror of a hammer.
pub fn is_shooting_star(bar: &PriceBar) -> bool {
    let body = bar.body();
    body > 0.0
        && bar.upper_shadow() >= 2.0 * body
        && bar.lower_shadow() <= 0.2 * body
        && bar.is_bearish()
}

/// Bearish candle followed by a bullish candle whose body covers it.
pub fn is_bullish_engulfing(prev: &PriceBar, cur: &PriceBar) -> bool {
    prev.is_bearish() && cur.is_bullish() && cur.open < prev.close && cur.close > prev.open
}

/// Bullish candle followed by a bearish candle whose body covers it.
pub fn is_bearish_engulfing(prev: &PriceBar, cur: &PriceBar) -> bool {
    prev.is_bullish() && cur.is_bearish() && cur.open > prev.close && cur.close < prev.open
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Pattern hits over a lookback window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatternCounts {
    pub bullish: usize,
    pub bearish: usize,
    pub doji: usize,
}

impl PatternCounts {
    /// Larger of the two directional counts.
    pub fn strength(&self) -> usize {
        self.bullish.max(self.bearish)
    }
}

/// Per-bar vote: +1 bullish pattern, -1 bearish pattern, 0 doji.
fn bar_vote(bars: &[PriceBar], i: usize) -> Option<f64> {
    let bar = &bars[i];
    let prev = i.checked_sub(1).map(|p| &bars[p]);

    let bullish = is_hammer(bar) || prev.is_some_and(|p| is_bullish_engulfing(p, bar));
    let bearish = is_shooting_star(bar) || prev.is_some_and(|p| is_bearish_engulfing(p, bar));

    match (bullish, bearish) {
        (true, false) => Some(1.0),
        (false, true) => Some(-1.0),
        (true, true) => Some(0.0),
        (false, false) if is_doji(bar) => Some(0.0),
        _ => None,
    }
}

/// Count pattern hits over the last `lookback` bars.
///
/// The first bar of the series is skipped since engulfing needs a
/// predecessor; each detector contributes separately to the counts.
pub fn scan_patterns(bars: &[PriceBar], lookback: usize) -> PatternCounts {
    let mut counts = PatternCounts::default();
    let start = bars.len().saturating_sub(lookback).max(1);

    for i in start..bars.len() {
        let (prev, bar) = (&bars[i - 1], &bars[i]);
        if is_hammer(bar) {
            counts.bullish += 1;
        }
        if is_shooting_star(bar) {
            counts.bearish += 1;
        }
        if is_bullish_engulfing(prev, bar) {
            counts.bullish += 1;
        }
        if is_bearish_engulfing(prev, bar) {
            counts.bearish += 1;
        }
        if is_doji(bar) {
            counts.doji += 1;
        }
    }
    counts
}

/// Directional bias of recent candles.
///
/// Returns `(bias, confidence)`: bias is the mean vote in [-1, 1] and
/// confidence the mean absolute vote. With no pattern present the result
/// is `(0.0, 0.5)`.
pub fn pattern_bias(bars: &[PriceBar], lookback: usize) -> (f64, f64) {
    let start = bars.len().saturating_sub(lookback);
    let votes: Vec<f64> = (start..bars.len()).filter_map(|i| bar_vote(bars, i)).collect();

    if votes.is_empty() {
        return (0.0, 0.5);
    }
    let n = votes.len() as f64;
    let bias = votes.iter().sum::<f64>() / n;
    let confidence = votes.iter().map(|v| v.abs()).sum::<f64>() / n;
    (bias.clamp(-1.0, 1.0), confidence.clamp(0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(), open, high, low, close)
    }

    fn plain() -> PriceBar {
        // Medium body, moderate shadows: no pattern.
        candle(100.0, 101.5, 99.5, 101.0)
    }

    #[test]
    fn test_doji() {
        assert!(is_doji(&candle(100.0, 101.0, 99.0, 100.05)));
        assert!(!is_doji(&candle(100.0, 101.0, 99.0, 100.5)));
        assert!(!is_doji(&candle(100.0, 100.0, 100.0, 100.0)));
    }

    #[test]
    fn test_hammer() {
        // body 1, lower shadow 3, upper shadow 0.1
        let h = candle(100.0, 101.1, 97.0, 101.0);
        assert!(is_hammer(&h));
        assert!(!is_shooting_star(&h));
        // bearish close is not a hammer
        assert!(!is_hammer(&candle(101.0, 101.1, 97.0, 100.0)));
        // zero body
        assert!(!is_hammer(&candle(100.0, 100.0, 97.0, 100.0)));
    }

    #[test]
    fn test_shooting_star() {
        let s = candle(101.0, 104.0, 99.9, 100.0);
        assert!(is_shooting_star(&s));
        assert!(!is_hammer(&s));
    }

    #[test]
    fn test_engulfing() {
        let down = candle(101.0, 101.2, 99.8, 100.0);
        let up = candle(99.5, 102.0, 99.4, 101.5);
        assert!(is_bullish_engulfing(&down, &up));
        assert!(!is_bearish_engulfing(&down, &up));

        let up_small = candle(100.0, 101.2, 99.8, 101.0);
        let down_big = candle(101.5, 101.6, 99.0, 99.5);
        assert!(is_bearish_engulfing(&up_small, &down_big));
    }

    #[test]
    fn test_scan_patterns_lookback() {
        let mut bars = vec![plain(); 10];
        bars.push(candle(100.0, 101.1, 97.0, 101.0)); // hammer
        let counts = scan_patterns(&bars, 5);
        assert_eq!(counts.bullish, 1);
        assert_eq!(counts.bearish, 0);
        assert_eq!(counts.strength(), 1);

        // Hammer outside the window is ignored.
        bars.extend(vec![plain(); 5]);
        assert_eq!(scan_patterns(&bars, 5), PatternCounts::default());
    }

    #[test]
    fn test_scan_skips_first_bar() {
        let bars = vec![candle(100.0, 101.1, 97.0, 101.0)];
        assert_eq!(scan_patterns(&bars, 5), PatternCounts::default());
    }

    #[test]
    fn test_pattern_bias_neutral_default() {
        let bars = vec![plain(); 10];
        assert_eq!(pattern_bias(&bars, 10), (0.0, 0.5));
        assert_eq!(pattern_bias(&[], 10), (0.0, 0.5));
    }

    #[test]
    fn test_pattern_bias_mixed() {
        let mut bars = vec![plain(); 5];
        bars.push(candle(100.0, 101.1, 97.0, 101.0)); // +1
        bars.push(candle(100.0, 101.0, 99.0, 100.05)); // doji, 0
        let (bias, conf) = pattern_bias(&bars, 3);
        assert!((bias - 0.5).abs() < 1e-12);
        assert!((conf - 0.5).abs() < 1e-12);
    }
}
