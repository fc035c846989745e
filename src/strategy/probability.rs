//! Probability calculator: blends a single-timeframe pattern estimate with
//! a multi-timeframe trend estimate.

use crate::indicators::candles::pattern_bias;
use crate::indicators::digits::{digit_history, digit_probability, even_odd_counts};
use crate::indicators::{closes, rsi, sma, sma_series};
use crate::types::{Direction, PriceBar, TradeType};

use super::timeframe::TimeframeSet;

const PATTERN_LOOKBACK: usize = 10;
const EVEN_ODD_WINDOW: usize = 10;
const DIGIT_MATCH_WINDOW: usize = 20;
const TREND_MIN_BARS: usize = 20;

/// Weight of the pattern estimate in [`final_probability`].
pub const PATTERN_WEIGHT: f64 = 0.3;
/// Weight of the multi-timeframe estimate in [`final_probability`].
pub const TIMEFRAME_WEIGHT: f64 = 0.7;

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// `(probability, confidence)` from recent candle patterns or quote digits.
pub fn pattern_probability(bars: &[PriceBar], trade_type: TradeType, decimals: u32) -> (f64, f64) {
    let (bias, confidence) = pattern_bias(bars, PATTERN_LOOKBACK);
    let closes = closes(bars);

    let probability = match trade_type {
        TradeType::Call | TradeType::Rise => (bias + 1.0) / 2.0,
        TradeType::Put | TradeType::Fall => (1.0 - bias) / 2.0,
        TradeType::DigitEven => {
            even_odd_counts(&digit_history(tail(&closes, EVEN_ODD_WINDOW), decimals)).even_ratio()
        }
        TradeType::DigitOdd => {
            even_odd_counts(&digit_history(tail(&closes, EVEN_ODD_WINDOW), decimals)).odd_ratio()
        }
        TradeType::DigitMatch(d) => {
            digit_probability(&digit_history(tail(&closes, DIGIT_MATCH_WINDOW), decimals), d)
        }
    };
    (probability.clamp(0.0, 1.0), confidence)
}

/// Per-timeframe trend vote: +1 when price is 2% above a rising SMA(20),
/// -1 when 2% below a falling one, else 0.
fn trend_vote(closes: &[f64]) -> f64 {
    if closes.len() < TREND_MIN_BARS {
        return 0.0;
    }
    let series = sma_series(closes, 20);
    let (Some(price), Some(ma)) = (closes.last().copied(), sma(closes, 20)) else {
        return 0.0;
    };
    let slope = match series.len().checked_sub(5).and_then(|i| series[i]) {
        Some(earlier) if closes.len() >= 25 => (ma - earlier) / 5.0,
        _ => 0.0,
    };

    if price > ma * 1.02 && slope > 0.0 {
        1.0
    } else if price < ma * 0.98 && slope < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Per-timeframe momentum vote: oversold RSI is bullish, overbought bearish.
fn momentum_vote(closes: &[f64]) -> f64 {
    match rsi(closes, 14) {
        Some(r) if r < 30.0 => 0.5,
        Some(r) if r > 70.0 => -0.5,
        _ => 0.0,
    }
}

/// Aggregate signal in [-1, 1] averaged over the timeframes present.
pub fn timeframe_signal(timeframes: &TimeframeSet) -> f64 {
    let votes: Vec<f64> = timeframes
        .iter()
        .filter(|(_, bars)| !bars.is_empty())
        .map(|(_, bars)| {
            let closes = closes(bars);
            trend_vote(&closes) + momentum_vote(&closes)
        })
        .collect();
    if votes.is_empty() {
        return 0.0;
    }
    (votes.iter().sum::<f64>() / votes.len() as f64).clamp(-1.0, 1.0)
}

/// `(probability, confidence)` from multi-timeframe votes.
///
/// Bearish contracts take the inverted probability; digit contracts have no
/// direction and get 0.5.
pub fn multi_timeframe_probability(timeframes: &TimeframeSet, trade_type: TradeType) -> (f64, f64) {
    let signal = timeframe_signal(timeframes);
    let bullish = (signal + 1.0) / 2.0;
    let probability = match trade_type.direction() {
        Direction::Bullish => bullish,
        Direction::Bearish => 1.0 - bullish,
        Direction::Neutral => 0.5,
    };
    let confidence = (0.5 + signal.abs() / 2.0).min(0.95);
    (probability, confidence)
}

/// Combined estimate: 30% pattern, 70% multi-timeframe when timeframe data
/// is present, else the pattern estimate alone.
pub fn final_probability(
    bars: &[PriceBar],
    timeframes: Option<&TimeframeSet>,
    trade_type: TradeType,
    decimals: u32,
) -> (f64, f64) {
    let (pattern_p, pattern_c) = pattern_probability(bars, trade_type, decimals);
    match timeframes.filter(|set| !set.is_empty()) {
        Some(set) => {
            let (tf_p, tf_c) = multi_timeframe_probability(set, trade_type);
            (
                PATTERN_WEIGHT * pattern_p + TIMEFRAME_WEIGHT * tf_p,
                PATTERN_WEIGHT * pattern_c + TIMEFRAME_WEIGHT * tf_c,
            )
        }
        None => (pattern_p, pattern_c),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::timeframe::Timeframe;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                PriceBar::new(start + Duration::minutes(i as i64), *c, c + 0.5, c - 0.5, *c)
            })
            .collect()
    }

    #[test]
    fn test_pattern_probability_neutral() {
        // Flat bars with zero range: no patterns at all.
        let bars: Vec<PriceBar> = make_bars(&[100.0; 20])
            .into_iter()
            .map(|b| PriceBar { high: b.close, low: b.close, ..b })
            .collect();
        let (p, c) = pattern_probability(&bars, TradeType::Call, 2);
        assert_eq!(p, 0.5);
        assert_eq!(c, 0.5);
        let (p, _) = pattern_probability(&bars, TradeType::Put, 2);
        assert_eq!(p, 0.5);
    }

    #[test]
    fn test_pattern_probability_digits() {
        // Last digits: 2, 4, 6, 8, 1 repeated → 80% even.
        let quotes: Vec<f64> = (0..10)
            .map(|i| [100.02, 100.04, 100.06, 100.08, 100.01][i % 5])
            .collect();
        let bars = make_bars(&quotes);
        let (even, _) = pattern_probability(&bars, TradeType::DigitEven, 2);
        let (odd, _) = pattern_probability(&bars, TradeType::DigitOdd, 2);
        assert!((even - 0.8).abs() < 1e-9);
        assert!((odd - 0.2).abs() < 1e-9);
        let (four, _) = pattern_probability(&bars, TradeType::DigitMatch(4), 2);
        assert!((four - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_timeframe_signal_uptrend() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let set = TimeframeSet::new().with(Timeframe::M1, make_bars(&closes));
        // Trend +1, RSI overbought -0.5.
        assert!((timeframe_signal(&set) - 0.5).abs() < 1e-9);

        let (p, c) = multi_timeframe_probability(&set, TradeType::Call);
        assert!((p - 0.75).abs() < 1e-9);
        assert!((c - 0.75).abs() < 1e-9);
        let (p, _) = multi_timeframe_probability(&set, TradeType::Fall);
        assert!((p - 0.25).abs() < 1e-9);
        let (p, _) = multi_timeframe_probability(&set, TradeType::DigitOdd);
        assert_eq!(p, 0.5);
    }

    #[test]
    fn test_timeframe_signal_empty() {
        assert_eq!(timeframe_signal(&TimeframeSet::new()), 0.0);
    }

    #[test]
    fn test_final_probability_weights() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let bars = make_bars(&closes);
        let set = TimeframeSet::new().with(Timeframe::M1, bars.clone());

        let (pp, pc) = pattern_probability(&bars, TradeType::Call, 2);
        let (tp, tc) = multi_timeframe_probability(&set, TradeType::Call);
        let (p, c) = final_probability(&bars, Some(&set), TradeType::Call, 2);
        assert!((p - (0.3 * pp + 0.7 * tp)).abs() < 1e-12);
        assert!((c - (0.3 * pc + 0.7 * tc)).abs() < 1e-12);

        assert_eq!(final_probability(&bars, None, TradeType::Call, 2), (pp, pc));
        let empty = TimeframeSet::new();
        assert_eq!(final_probability(&bars, Some(&empty), TradeType::Call, 2), (pp, pc));
    }
}
