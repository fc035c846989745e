//! Shared types for the VOLBOT trading core.
//!
//! These types form the data model used across all modules.
//! Indicators, strategies, the risk manager and the engine depend on
//! them without depending on each other.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Price data
// ---------------------------------------------------------------------------

/// One OHLC bar from the market-data feed. Never mutated once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl fmt::Display for PriceBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] O={:.3} H={:.3} L={:.3} C={:.3}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.open,
            self.high,
            self.low,
            self.close,
        )
    }
}

impl PriceBar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { timestamp, open, high, low, close }
    }

    /// Absolute candle body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// High-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

// ---------------------------------------------------------------------------
// Contract types
// ---------------------------------------------------------------------------

/// Directional bias of a contract or a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "bullish"),
            Direction::Bearish => write!(f, "bearish"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

/// Binary-option contract type, named after the broker contract codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeType {
    Call,
    Put,
    Rise,
    Fall,
    DigitEven,
    DigitOdd,
    /// Last digit of the exit quote equals the given digit (0–9).
    DigitMatch(u8),
}

impl TradeType {
    /// Directional contracts plus the even/odd digit pair.
    pub const STANDARD: &'static [TradeType] = &[
        TradeType::Call,
        TradeType::Put,
        TradeType::Rise,
        TradeType::Fall,
        TradeType::DigitEven,
        TradeType::DigitOdd,
    ];

    pub fn direction(&self) -> Direction {
        match self {
            TradeType::Call | TradeType::Rise => Direction::Bullish,
            TradeType::Put | TradeType::Fall => Direction::Bearish,
            TradeType::DigitEven | TradeType::DigitOdd | TradeType::DigitMatch(_) => {
                Direction::Neutral
            }
        }
    }

    pub fn is_digit(&self) -> bool {
        self.direction() == Direction::Neutral
    }

    /// Broker contract code, e.g. `CALL` or `DIGIT7`.
    pub fn code(&self) -> String {
        match self {
            TradeType::Call => "CALL".to_string(),
            TradeType::Put => "PUT".to_string(),
            TradeType::Rise => "RISE".to_string(),
            TradeType::Fall => "FALL".to_string(),
            TradeType::DigitEven => "DIGITEVEN".to_string(),
            TradeType::DigitOdd => "DIGITODD".to_string(),
            TradeType::DigitMatch(d) => format!("DIGIT{d}"),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Parse a broker contract code (case-insensitive).
impl std::str::FromStr for TradeType {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "CALL" => Ok(TradeType::Call),
            "PUT" => Ok(TradeType::Put),
            "RISE" => Ok(TradeType::Rise),
            "FALL" => Ok(TradeType::Fall),
            "DIGITEVEN" => Ok(TradeType::DigitEven),
            "DIGITODD" => Ok(TradeType::DigitOdd),
            other => match other.strip_prefix("DIGIT").map(str::as_bytes) {
                Some(&[d]) if d.is_ascii_digit() => Ok(TradeType::DigitMatch(d - b'0')),
                _ => Err(BotError::UnknownTradeType(s.to_string())),
            },
        }
    }
}

impl Serialize for TradeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for TradeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Settled contract result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trade log
// ---------------------------------------------------------------------------

/// A settled trade. Appended to the trade log and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub trade_type: TradeType,
    /// Heuristic that produced the signal.
    pub strategy: String,
    pub stake: f64,
    pub outcome: Outcome,
    pub profit_loss: f64,
    pub probability: f64,
    pub confidence: f64,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.profit_loss >= 0.0 { "+" } else { "" };
        write!(
            f,
            "[{}] {} {} stake=${:.2} {} ({sign}{:.2}) p={:.0}% c={:.0}%",
            self.market_id,
            self.trade_type,
            self.strategy,
            self.stake,
            self.outcome,
            self.profit_loss,
            self.probability * 100.0,
            self.confidence * 100.0,
        )
    }
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.outcome == Outcome::Win
    }

    /// UTC calendar date the trade settled on.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

// ---------------------------------------------------------------------------
// Risk state
// ---------------------------------------------------------------------------

/// Per-day aggregates of settled trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pnl: f64,
}

/// Running account state maintained by the risk manager.
///
/// After any recorded trade exactly one of `win_streak` / `loss_streak`
/// is non-zero. `balance` never goes below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub initial_balance: f64,
    pub balance: f64,
    pub peak_balance: f64,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub daily_totals: BTreeMap<NaiveDate, DailyTotals>,
}

impl fmt::Display for RiskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance=${:.2} peak=${:.2} drawdown={:.1}% streak=W{}/L{} days={}",
            self.balance,
            self.peak_balance,
            self.drawdown() * 100.0,
            self.win_streak,
            self.loss_streak,
            self.daily_totals.len(),
        )
    }
}

impl RiskState {
    pub fn new(initial_balance: f64) -> Self {
        let balance = initial_balance.max(0.0);
        Self {
            initial_balance: balance,
            balance,
            peak_balance: balance,
            win_streak: 0,
            loss_streak: 0,
            daily_totals: BTreeMap::new(),
        }
    }

    /// Decline from peak as a fraction (0.0 = at peak).
    pub fn drawdown(&self) -> f64 {
        if self.peak_balance <= 0.0 {
            0.0
        } else {
            1.0 - (self.balance / self.peak_balance)
        }
    }

    /// Totals for a given day (zeroed if nothing traded).
    pub fn daily(&self, date: NaiveDate) -> DailyTotals {
        self.daily_totals.get(&date).copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Strategy output
// ---------------------------------------------------------------------------

/// Output of one heuristic evaluation. Stateless; produced fresh per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub trade_type: Option<TradeType>,
    pub probability: f64,
    pub confidence: f64,
    pub stake_multiplier: f64,
}

impl Default for StrategySignal {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for StrategySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trade_type {
            Some(t) => write!(
                f,
                "{t} p={:.0}% c={:.0}% x{:.1}",
                self.probability * 100.0,
                self.confidence * 100.0,
                self.stake_multiplier,
            ),
            None => write!(f, "no signal"),
        }
    }
}

impl StrategySignal {
    /// The null signal: no trade, zero probability and confidence.
    pub const fn none() -> Self {
        Self {
            trade_type: None,
            probability: 0.0,
            confidence: 0.0,
            stake_multiplier: 1.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.trade_type.is_some()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for VOLBOT.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown trade type: {0}")]
    UnknownTradeType(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Market feed error: {0}")]
    Feed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
