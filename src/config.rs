//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. The
//! `[trading]` table is the flat bot parameter record; every field has a
//! default so a partial file is valid. Out-of-range numbers are clamped
//! rather than rejected.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::strategy::StrategyKind;
use crate::types::{BotError, TradeType};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    #[serde(default)]
    pub trading: TradingParams,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
    /// Delay between bars pulled from the feed.
    pub tick_interval_ms: u64,
    /// JSON array of recorded bars to replay.
    pub bars_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub journal_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

// ---------------------------------------------------------------------------
// Trading parameters
// ---------------------------------------------------------------------------

/// Flat record of named trading parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingParams {
    pub market: String,
    pub trade_types: Vec<TradeType>,
    pub strategy: StrategyKind,
    pub initial_balance: f64,
    pub probability_threshold: f64,
    pub confidence_threshold: f64,
    pub risk_tolerance: f64,
    pub max_trades_per_day: u32,
    /// Stop opening trades for the day once daily P/L reaches this.
    pub take_profit: f64,
    pub trading_start: String,
    pub trading_end: String,
    pub trading_days: Vec<String>,
    /// Bars handed to the single-timeframe heuristics.
    pub analysis_window: usize,
    /// Bars kept in memory (also the source for resampled timeframes).
    pub history_limit: usize,
    pub payout_ratio: f64,
    /// Decimal places of the quote, for last-digit contracts.
    pub price_decimals: u32,
    pub use_trend_filter: bool,
    pub use_volatility_filter: bool,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            market: "R_10".to_string(),
            trade_types: TradeType::STANDARD.to_vec(),
            strategy: StrategyKind::default(),
            initial_balance: 1000.0,
            probability_threshold: 0.65,
            confidence_threshold: 0.6,
            risk_tolerance: 0.5,
            max_trades_per_day: 20,
            take_profit: 100.0,
            trading_start: "00:00".to_string(),
            trading_end: "23:59".to_string(),
            trading_days: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .map(String::from)
                .to_vec(),
            analysis_window: 50,
            history_limit: 1000,
            payout_ratio: 0.95,
            price_decimals: 2,
            use_trend_filter: true,
            use_volatility_filter: true,
        }
    }
}

/// Parsed trading days and daily time window.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWindow {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    /// Whether `day`/`time` falls inside the window (inclusive). A window
    /// whose end precedes its start wraps past midnight.
    pub fn contains(&self, day: Weekday, time: NaiveTime) -> bool {
        if !self.days.contains(&day) {
            return false;
        }
        if self.start <= self.end {
            time >= self.start && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime, BotError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|_| BotError::Config(format!("invalid time of day: {raw}")))
}

impl TradingParams {
    /// Clamp numeric fields into their valid ranges.
    pub fn clamped(mut self) -> Self {
        self.probability_threshold = self.probability_threshold.clamp(0.0, 1.0);
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        self.risk_tolerance = self.risk_tolerance.clamp(0.1, 1.0);
        self.initial_balance = self.initial_balance.max(0.0);
        self.take_profit = self.take_profit.max(0.0);
        self.payout_ratio = self.payout_ratio.clamp(0.0, 10.0);
        self.price_decimals = self.price_decimals.min(8);
        self.analysis_window = self.analysis_window.max(30);
        self.history_limit = self.history_limit.max(self.analysis_window);
        if self.trade_types.is_empty() {
            self.trade_types = TradeType::STANDARD.to_vec();
        }
        self
    }

    pub fn session(&self) -> Result<SessionWindow, BotError> {
        let days = self
            .trading_days
            .iter()
            .map(|d| {
                d.trim()
                    .parse::<Weekday>()
                    .map_err(|_| BotError::Config(format!("invalid trading day: {d}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SessionWindow {
            days,
            start: parse_hhmm(&self.trading_start)?,
            end: parse_hhmm(&self.trading_end)?,
        })
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.trading = config.trading.clamped();
        config.trading.session()?;
        Ok(config)
    }
}
