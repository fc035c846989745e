//! Strategy engine: scoring heuristics, timeframe sets, probability
//! blending, and risk management.

pub mod heuristics;
pub mod probability;
pub mod risk;
pub mod timeframe;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::types::{BotError, PriceBar, StrategySignal, TradeType};
use timeframe::TimeframeSet;

// ---------------------------------------------------------------------------
// Strategy kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PatternBased,
    TrendFollowing,
    MeanReversion,
    Breakout,
    #[default]
    MultiTimeframe,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::PatternBased,
        StrategyKind::TrendFollowing,
        StrategyKind::MeanReversion,
        StrategyKind::Breakout,
        StrategyKind::MultiTimeframe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PatternBased => "pattern_based",
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Breakout => "breakout",
            StrategyKind::MultiTimeframe => "multi_timeframe",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| BotError::UnknownStrategy(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Dispatches to whichever heuristic is active. No voting across heuristics.
#[derive(Debug, Clone, Default)]
pub struct StrategyEngine {
    active: StrategyKind,
}

impl StrategyEngine {
    pub fn new(active: StrategyKind) -> Self {
        Self { active }
    }

    pub fn active(&self) -> StrategyKind {
        self.active
    }

    pub fn available(&self) -> &'static [StrategyKind] {
        &StrategyKind::ALL
    }

    pub fn set_strategy(&mut self, kind: StrategyKind) {
        if kind != self.active {
            info!(from = %self.active, to = %kind, "Strategy changed");
        }
        self.active = kind;
    }

    /// Evaluate the active heuristic.
    ///
    /// `bars` is the primary (1-minute) window; `timeframes` is only read by
    /// the multi-timeframe heuristic.
    pub fn evaluate(
        &self,
        bars: &[PriceBar],
        timeframes: &TimeframeSet,
        allowed: &[TradeType],
    ) -> StrategySignal {
        let signal = match self.active {
            StrategyKind::PatternBased => heuristics::pattern_based(bars, allowed),
            StrategyKind::TrendFollowing => heuristics::trend_following(bars, allowed),
            StrategyKind::MeanReversion => heuristics::mean_reversion(bars, allowed),
            StrategyKind::Breakout => heuristics::breakout(bars, allowed),
            StrategyKind::MultiTimeframe => heuristics::multi_timeframe(timeframes, allowed),
        };
        debug!(strategy = %self.active, bars = bars.len(), signal = %signal, "Strategy evaluated");
        signal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
