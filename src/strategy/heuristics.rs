//! Scoring heuristics.
//!
//! Each heuristic is a pure function of a bar window (plus timeframes for
//! confluence) and the allowed contract types. Below the minimum history a
//! heuristic returns [`StrategySignal::none`]. When the preferred contract is
//! not allowed the next one in the fallback order is tried; if none is
//! allowed the signal carries no trade type.

use crate::indicators::candles::scan_patterns;
use crate::indicators::{closes, ema, rsi, sma};
use crate::types::{PriceBar, StrategySignal, TradeType};

use super::timeframe::{Timeframe, TimeframeSet};

/// Bars required before any heuristic produces a signal.
pub const MIN_HISTORY: usize = 30;

const PATTERN_LOOKBACK: usize = 5;
const RSI_PERIOD: usize = 14;
const BREAKOUT_WINDOW: usize = 10;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// First allowed contract in `preferences`, with its (probability, confidence).
fn pick(allowed: &[TradeType], preferences: &[(TradeType, f64, f64)]) -> StrategySignal {
    preferences
        .iter()
        .find(|(tt, _, _)| allowed.contains(tt))
        .map(|(tt, p, c)| StrategySignal {
            trade_type: Some(*tt),
            probability: *p,
            confidence: *c,
            stake_multiplier: 1.0,
        })
        .unwrap_or_else(StrategySignal::none)
}

// ---------------------------------------------------------------------------
// Pattern-based
// ---------------------------------------------------------------------------

/// Candle patterns over the last five bars, confirmed by the EMA(20) trend.
pub fn pattern_based(bars: &[PriceBar], allowed: &[TradeType]) -> StrategySignal {
    if bars.len() < MIN_HISTORY {
        return StrategySignal::none();
    }
    let closes = closes(bars);
    let (Some(ema20), Some(last)) = (ema(&closes, 20), closes.last().copied()) else {
        return StrategySignal::none();
    };
    let trend_bullish = last > ema20;
    let counts = scan_patterns(bars, PATTERN_LOOKBACK);

    let mut signal = if counts.bullish > 0 && trend_bullish {
        let p = 0.6 + 0.05 * counts.bullish as f64;
        pick(allowed, &[(TradeType::Call, p, 0.65), (TradeType::Rise, p, 0.65)])
    } else if counts.bearish > 0 && !trend_bullish {
        let p = 0.6 + 0.05 * counts.bearish as f64;
        pick(allowed, &[(TradeType::Put, p, 0.65), (TradeType::Fall, p, 0.65)])
    } else {
        StrategySignal::none()
    };

    if signal.is_actionable() {
        let strength = counts.strength();
        if strength >= 3 {
            signal.confidence = 0.8;
            signal.stake_multiplier = 1.5;
        } else if strength >= 2 {
            signal.confidence = 0.7;
            signal.stake_multiplier = 1.2;
        }
        signal.probability = signal.probability.min(1.0);
    }
    signal
}

// ---------------------------------------------------------------------------
// Trend-following
// ---------------------------------------------------------------------------

/// Price and EMA(10) on the same side of SMA(20).
pub fn trend_following(bars: &[PriceBar], allowed: &[TradeType]) -> StrategySignal {
    if bars.len() < MIN_HISTORY {
        return StrategySignal::none();
    }
    let closes = closes(bars);
    let (Some(sma20), Some(ema10), Some(price)) =
        (sma(&closes, 20), ema(&closes, 10), closes.last().copied())
    else {
        return StrategySignal::none();
    };

    let uptrend = price > sma20 && ema10 > sma20;
    let downtrend = price < sma20 && ema10 < sma20;

    let mut signal = if uptrend {
        pick(
            allowed,
            &[
                (TradeType::Call, 0.65, 0.7),
                (TradeType::Rise, 0.65, 0.7),
                (TradeType::DigitEven, 0.55, 0.6),
            ],
        )
    } else if downtrend {
        pick(
            allowed,
            &[
                (TradeType::Put, 0.65, 0.7),
                (TradeType::Fall, 0.65, 0.7),
                (TradeType::DigitOdd, 0.55, 0.6),
            ],
        )
    } else {
        StrategySignal::none()
    };

    signal.stake_multiplier = if signal.probability > 0.7 {
        1.5
    } else if signal.probability > 0.6 {
        1.2
    } else {
        1.0
    };
    signal
}

// ---------------------------------------------------------------------------
// Mean-reversion
// ---------------------------------------------------------------------------

/// RSI(14) oversold/overbought reversal.
pub fn mean_reversion(bars: &[PriceBar], allowed: &[TradeType]) -> StrategySignal {
    if bars.len() < MIN_HISTORY {
        return StrategySignal::none();
    }
    let Some(current) = rsi(&closes(bars), RSI_PERIOD) else {
        return StrategySignal::none();
    };

    let mut signal = if current <= 30.0 {
        pick(
            allowed,
            &[
                (TradeType::Call, 0.7, 0.65),
                (TradeType::Rise, 0.7, 0.65),
                (TradeType::DigitEven, 0.55, 0.6),
            ],
        )
    } else if current >= 70.0 {
        pick(
            allowed,
            &[
                (TradeType::Put, 0.7, 0.65),
                (TradeType::Fall, 0.7, 0.65),
                (TradeType::DigitOdd, 0.55, 0.6),
            ],
        )
    } else {
        StrategySignal::none()
    };

    if signal.is_actionable() {
        if current <= 20.0 || current >= 80.0 {
            signal.stake_multiplier = 1.5;
            signal.confidence = (signal.confidence + 0.1).min(0.8);
        } else if current <= 25.0 || current >= 75.0 {
            signal.stake_multiplier = 1.2;
        }
    }
    signal
}

// ---------------------------------------------------------------------------
// Breakout
// ---------------------------------------------------------------------------

/// Close beyond the recent range by 0.5%, in the direction of SMA(50).
///
/// The range is the nine bars before the last one. With fewer than 50 bars
/// the trend average covers the whole window.
pub fn breakout(bars: &[PriceBar], allowed: &[TradeType]) -> StrategySignal {
    if bars.len() < MIN_HISTORY {
        return StrategySignal::none();
    }
    let closes = closes(bars);
    let Some(trend) = sma(&closes, 50.min(closes.len())) else {
        return StrategySignal::none();
    };

    let recent = &bars[bars.len() - BREAKOUT_WINDOW..bars.len() - 1];
    let resistance = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let support = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let price = closes[closes.len() - 1];

    let resistance_break = price > resistance * 1.005;
    let support_break = price < support * 0.995;
    let uptrend = price > trend;

    let mut signal = if resistance_break && uptrend {
        pick(allowed, &[(TradeType::Call, 0.7, 0.75), (TradeType::Rise, 0.7, 0.75)])
    } else if support_break && !uptrend {
        pick(allowed, &[(TradeType::Put, 0.7, 0.75), (TradeType::Fall, 0.7, 0.75)])
    } else {
        StrategySignal::none()
    };

    if signal.is_actionable() {
        let strength = if resistance_break {
            (price - resistance) / resistance
        } else {
            (support - price) / support
        };
        if strength > 0.01 {
            signal.stake_multiplier = 1.5;
            signal.confidence = (signal.confidence + 0.1).min(0.85);
        }
    }
    signal
}

// ---------------------------------------------------------------------------
// Multi-timeframe confluence
// ---------------------------------------------------------------------------

/// Bullish and bearish votes summed over the 1m, 5m and 15m series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfluenceScore {
    pub bullish: f64,
    pub bearish: f64,
}

/// Score every confluence timeframe, or `None` if any has fewer than
/// [`MIN_HISTORY`] bars.
pub fn confluence_score(timeframes: &TimeframeSet) -> Option<ConfluenceScore> {
    let mut score = ConfluenceScore::default();
    for tf in Timeframe::CONFLUENCE {
        let bars = timeframes.get_min(tf, MIN_HISTORY)?;
        let closes = closes(bars);
        let price = *closes.last()?;
        let ema20 = ema(&closes, 20)?;
        let ema50 = ema(&closes, 50)?;

        if price > ema20 && ema20 > ema50 {
            score.bullish += 1.0;
        }
        if price < ema20 && ema20 < ema50 {
            score.bearish += 1.0;
        }
        match rsi(&closes, RSI_PERIOD) {
            Some(r) if r > 60.0 => score.bullish += 0.5,
            Some(r) if r < 40.0 => score.bearish += 0.5,
            _ => {}
        }
    }
    Some(score)
}

/// Trade only when one side scores at least 2.5 and beats the other.
pub fn multi_timeframe(timeframes: &TimeframeSet, allowed: &[TradeType]) -> StrategySignal {
    let Some(score) = confluence_score(timeframes) else {
        return StrategySignal::none();
    };

    let mut signal = if score.bullish >= 2.5 && score.bullish > score.bearish {
        pick(allowed, &[(TradeType::Call, 0.7, 0.75), (TradeType::Rise, 0.7, 0.75)])
    } else if score.bearish >= 2.5 && score.bearish > score.bullish {
        pick(allowed, &[(TradeType::Put, 0.7, 0.75), (TradeType::Fall, 0.7, 0.75)])
    } else {
        StrategySignal::none()
    };

    if signal.is_actionable() {
        let strength = score.bullish.max(score.bearish);
        if strength >= 4.0 {
            signal.confidence = 0.85;
            signal.stake_multiplier = 1.5;
        } else if strength >= 3.0 {
            signal.confidence = 0.75;
            signal.stake_multiplier = 1.2;
        }
    }
    signal
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    // ---- helpers -----------------------------------------------------------

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

    /// Plain bullish candles: body 0.2, shadows 0.1; no pattern fires.
    fn plain_rising(n: usize) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + 0.1 * i as f64;
                PriceBar::new(start + Duration::minutes(i as i64), c - 0.2, c + 0.1, c - 0.3, c)
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 200.0 - i as f64).collect()
    }

    const ALL: &[TradeType] = TradeType::STANDARD;

    // ---- minimum history ---------------------------------------------------

    #[test]
    fn test_short_history_is_null() {
        let bars = make_bars(&rising(29));
        assert_eq!(pattern_based(&bars, ALL), StrategySignal::none());
        assert_eq!(trend_following(&bars, ALL), StrategySignal::none());
        assert_eq!(mean_reversion(&bars, ALL), StrategySignal::none());
        assert_eq!(breakout(&bars, ALL), StrategySignal::none());
    }

    // ---- pattern-based -----------------------------------------------------

    #[test]
    fn test_pattern_hammer_in_uptrend() {
        let mut bars = plain_rising(40);
        let last = bars.len() - 1;
        let c = bars[last].close;
        // Long lower shadow, tiny upper shadow.
        bars[last] = PriceBar::new(bars[last].timestamp, c - 0.2, c + 0.01, c - 0.7, c);

        let s = pattern_based(&bars, ALL);
        assert_eq!(s.trade_type, Some(TradeType::Call));
        assert!((s.probability - 0.65).abs() < 1e-9);
        assert_eq!(s.confidence, 0.65);
        assert_eq!(s.stake_multiplier, 1.0);

        let s = pattern_based(&bars, &[TradeType::Rise]);
        assert_eq!(s.trade_type, Some(TradeType::Rise));

        let s = pattern_based(&bars, &[TradeType::Put, TradeType::DigitEven]);
        assert!(!s.is_actionable());
    }

    #[test]
    fn test_pattern_none_without_patterns() {
        let s = pattern_based(&plain_rising(40), ALL);
        assert!(!s.is_actionable());
    }

    // ---- trend-following ---------------------------------------------------

    #[test]
    fn test_trend_following_uptrend() {
        let bars = make_bars(&rising(40));
        let s = trend_following(&bars, ALL);
        assert_eq!(s.trade_type, Some(TradeType::Call));
        assert_eq!(s.probability, 0.65);
        assert_eq!(s.confidence, 0.7);
        assert_eq!(s.stake_multiplier, 1.2);
    }

    #[test]
    fn test_trend_following_digit_fallback() {
        let bars = make_bars(&rising(40));
        let s = trend_following(&bars, &[TradeType::DigitEven, TradeType::DigitOdd]);
        assert_eq!(s.trade_type, Some(TradeType::DigitEven));
        assert_eq!(s.probability, 0.55);
        assert_eq!(s.stake_multiplier, 1.0);

        let s = trend_following(&bars, &[TradeType::DigitOdd]);
        assert!(!s.is_actionable());
    }

    #[test]
    fn test_trend_following_downtrend() {
        let bars = make_bars(&falling(40));
        let s = trend_following(&bars, &[TradeType::Fall, TradeType::Put]);
        assert_eq!(s.trade_type, Some(TradeType::Put));
    }

    // ---- mean-reversion ----------------------------------------------------

    #[test]
    fn test_mean_reversion_oversold() {
        let bars = make_bars(&falling(40));
        let s = mean_reversion(&bars, ALL);
        assert_eq!(s.trade_type, Some(TradeType::Call));
        assert_eq!(s.probability, 0.7);
        assert!((s.confidence - 0.75).abs() < 1e-9);
        assert_eq!(s.stake_multiplier, 1.5);
    }

    #[test]
    fn test_mean_reversion_overbought() {
        let bars = make_bars(&rising(40));
        let s = mean_reversion(&bars, &[TradeType::DigitOdd]);
        assert_eq!(s.trade_type, Some(TradeType::DigitOdd));
        assert_eq!(s.probability, 0.55);
        assert!((s.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_mean_reversion_neutral() {
        let chop: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        assert!(!mean_reversion(&make_bars(&chop), ALL).is_actionable());
    }

    // ---- breakout ----------------------------------------------------------

    #[test]
    fn test_breakout_up() {
        let mut closes = vec![100.0; 39];
        closes.push(102.0);
        let s = breakout(&make_bars(&closes), ALL);
        assert_eq!(s.trade_type, Some(TradeType::Call));
        assert_eq!(s.probability, 0.7);
        assert!((s.confidence - 0.85).abs() < 1e-9);
        assert_eq!(s.stake_multiplier, 1.5);
    }

    #[test]
    fn test_breakout_down_weak() {
        let mut closes = vec![100.0; 39];
        closes.push(98.9);
        // Support 99.5; 98.9 < 99.0025 but strength under 1%.
        let s = breakout(&make_bars(&closes), &[TradeType::Fall]);
        assert_eq!(s.trade_type, Some(TradeType::Fall));
        assert_eq!(s.confidence, 0.75);
        assert_eq!(s.stake_multiplier, 1.0);
    }

    #[test]
    fn test_breakout_inside_range() {
        let closes = vec![100.0; 40];
        assert!(!breakout(&make_bars(&closes), ALL).is_actionable());
    }

    // ---- multi-timeframe ---------------------------------------------------

    #[test]
    fn test_multi_timeframe_bullish_confluence() {
        let minutes: Vec<f64> = (0..450).map(|i| 100.0 + 0.01 * i as f64).collect();
        let set = TimeframeSet::from_base(&make_bars(&minutes));
        let score = confluence_score(&set).unwrap();
        assert_eq!(score.bullish, 4.5);
        assert_eq!(score.bearish, 0.0);

        let s = multi_timeframe(&set, ALL);
        assert_eq!(s.trade_type, Some(TradeType::Call));
        assert_eq!(s.confidence, 0.85);
        assert_eq!(s.stake_multiplier, 1.5);
    }

    #[test]
    fn test_multi_timeframe_bearish_confluence() {
        let minutes: Vec<f64> = (0..450).map(|i| 200.0 - 0.01 * i as f64).collect();
        let set = TimeframeSet::from_base(&make_bars(&minutes));
        let s = multi_timeframe(&set, &[TradeType::Fall]);
        assert_eq!(s.trade_type, Some(TradeType::Fall));
    }

    #[test]
    fn test_multi_timeframe_requires_all_series() {
        // 15m series only has 29 bars.
        let minutes: Vec<f64> = (0..435).map(|i| 100.0 + 0.01 * i as f64).collect();
        let set = TimeframeSet::from_base(&make_bars(&minutes));
        assert!(confluence_score(&set).is_none());
        assert_eq!(multi_timeframe(&set, ALL), StrategySignal::none());
    }
}
