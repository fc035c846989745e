//! Market condition assessment: trend strength, support/resistance levels
//! and volatility normalised for the stake sizer.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{atr, closes, returns_volatility, swing_points};
use crate::types::{Direction, PriceBar};

/// Bars of history required before trend strength is measured.
pub const TREND_MIN_BARS: usize = 30;
/// Bars of history required before support/resistance is measured.
pub const LEVELS_MIN_BARS: usize = 20;

const SWING_WINDOW: usize = 5;
const ATR_PERIOD: usize = 14;
const VOLATILITY_WINDOW: usize = 20;
/// Annualised return volatility above which a trendless market is "volatile".
const SIDEWAYS_VOLATILITY: f64 = 0.2;

// ---------------------------------------------------------------------------
// Market condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    StrongUptrend,
    StrongDowntrend,
    Uptrend,
    Downtrend,
    VolatileSideways,
    Ranging,
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketCondition::StrongUptrend => "strong_uptrend",
            MarketCondition::StrongDowntrend => "strong_downtrend",
            MarketCondition::Uptrend => "uptrend",
            MarketCondition::Downtrend => "downtrend",
            MarketCondition::VolatileSideways => "volatile_sideways",
            MarketCondition::Ranging => "ranging",
        };
        write!(f, "{s}")
    }
}

impl MarketCondition {
    pub fn direction(&self) -> Direction {
        match self {
            MarketCondition::StrongUptrend | MarketCondition::Uptrend => Direction::Bullish,
            MarketCondition::StrongDowntrend | MarketCondition::Downtrend => Direction::Bearish,
            MarketCondition::VolatileSideways | MarketCondition::Ranging => Direction::Neutral,
        }
    }
}

/// Nearest support and resistance around the current price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Levels {
    pub support: f64,
    pub resistance: f64,
    pub current: f64,
}

impl Levels {
    pub fn midpoint(&self) -> f64 {
        (self.support + self.resistance) / 2.0
    }
}

/// Full snapshot returned by [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub condition: MarketCondition,
    pub trend_strength: f64,
    pub volatility: f64,
    pub levels: Levels,
    /// 0 to 100, higher is riskier.
    pub risk_rating: f64,
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// Trend strength in [0, 1] from move-direction consistency and momentum.
/// Returns 0.5 with fewer than 30 closes or no movement.
pub fn trend_strength(closes: &[f64]) -> f64 {
    if closes.len() < TREND_MIN_BARS {
        return 0.5;
    }

    let (ups, downs) = closes.windows(2).fold((0usize, 0usize), |(u, d), w| {
        if w[1] > w[0] {
            (u + 1, d)
        } else if w[1] < w[0] {
            (u, d + 1)
        } else {
            (u, d)
        }
    });
    let moves = ups + downs;
    if moves == 0 {
        return 0.5;
    }

    let consistency = ups.max(downs) as f64 / moves as f64;
    let mean = closes.iter().sum::<f64>() / closes.len() as f64;
    let momentum = if mean == 0.0 {
        0.0
    } else {
        (closes[closes.len() - 1] - closes[0]).abs() / mean
    };

    (0.7 * consistency + 0.3 * momentum).min(1.0)
}

/// Closest swing low below and swing high above the current close.
///
/// Falls back to ±5% of the current price when no swing level qualifies.
/// With fewer than 20 closes every field is zero.
pub fn support_resistance(closes: &[f64]) -> Levels {
    if closes.len() < LEVELS_MIN_BARS {
        return Levels::default();
    }

    let current = closes[closes.len() - 1];
    let swings = swing_points(closes, SWING_WINDOW);

    let support = swings
        .lows
        .iter()
        .map(|i| closes[*i])
        .filter(|p| *p < current)
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
        .unwrap_or(current * 0.95);

    let resistance = swings
        .highs
        .iter()
        .map(|i| closes[*i])
        .filter(|p| *p > current)
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))))
        .unwrap_or(current * 1.05);

    Levels { support, resistance, current }
}

/// ATR(14) as a percent of the last close, divided by 3 and clamped to
/// [0.1, 1.0]. Returns 0.5 when there is not enough history.
pub fn normalized_volatility(bars: &[PriceBar]) -> f64 {
    let Some(last) = bars.last() else {
        return 0.5;
    };
    match atr(bars, ATR_PERIOD) {
        Some(a) if last.close > 0.0 => ((a / last.close * 100.0) / 3.0).clamp(0.1, 1.0),
        _ => 0.5,
    }
}

/// Annualised standard deviation of returns over a 20-bar window
/// (1.0 with insufficient history).
pub fn annualized_volatility(closes: &[f64]) -> f64 {
    returns_volatility(closes, VOLATILITY_WINDOW)
        .map(|v| v * 252f64.sqrt())
        .unwrap_or(1.0)
}

/// Classify the market from trend strength, direction of the net move and
/// return volatility.
pub fn analyze(bars: &[PriceBar]) -> MarketSnapshot {
    let closes = closes(bars);
    let strength = trend_strength(&closes);
    let levels = support_resistance(&closes);
    let volatility = annualized_volatility(&closes);
    let net_move = match (closes.first(), closes.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    // Net move decides direction; the level midpoint only breaks ties.
    let above_mid = if net_move != 0.0 {
        net_move > 0.0
    } else {
        levels.current > levels.midpoint()
    };

    let condition = if strength > 0.7 {
        if above_mid {
            MarketCondition::StrongUptrend
        } else {
            MarketCondition::StrongDowntrend
        }
    } else if strength > 0.4 {
        if above_mid {
            MarketCondition::Uptrend
        } else {
            MarketCondition::Downtrend
        }
    } else if volatility > SIDEWAYS_VOLATILITY {
        MarketCondition::VolatileSideways
    } else {
        MarketCondition::Ranging
    };

    MarketSnapshot {
        condition,
        trend_strength: strength,
        volatility,
        levels,
        risk_rating: risk_rating(volatility, strength),
    }
}

/// Half weight on volatility, half on missing trend, capped at 100.
pub fn risk_rating(volatility: f64, trend_strength: f64) -> f64 {
    (volatility * 50.0 + (1.0 - trend_strength) * 50.0).min(100.0)
}

pub fn assess(bars: &[PriceBar]) -> MarketCondition {
    analyze(bars).condition
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
