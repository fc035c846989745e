//! Trader: explicit per-market application state and the bar handler.
//!
//! Every incoming bar goes through `on_bar`: settle the open contract, check
//! the stop rules and session gates, evaluate the active heuristic, apply
//! thresholds and filters, then size and open a new one-bar contract.

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{SessionWindow, TradingParams};
use crate::indicators::market::{self, MarketCondition, MarketSnapshot};
use crate::storage::TradeJournal;
use crate::strategy::heuristics::MIN_HISTORY;
use crate::strategy::probability;
use crate::strategy::risk::{RiskConfig, RiskManager, StopReason, MAX_RISK_PCT, MIN_STAKE};
use crate::strategy::timeframe::TimeframeSet;
use crate::strategy::{StrategyEngine, StrategyKind};
use crate::types::{BotError, Direction, PriceBar, StrategySignal, Trade, TradeType};

use super::settlement::OpenContract;

// ---------------------------------------------------------------------------
// Tick outcomes
// ---------------------------------------------------------------------------

/// Why a bar produced no new contract even though trading is allowed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    OutsideSession,
    DailyTradeLimit { trades: u32 },
    TakeProfitReached { daily_pnl: f64 },
    BelowThreshold { probability: f64, confidence: f64 },
    TrendFilter { condition: MarketCondition },
    VolatilityFilter,
    InsufficientBalance { balance: f64 },
    Paused,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OutsideSession => write!(f, "outside trading session"),
            SkipReason::DailyTradeLimit { trades } => {
                write!(f, "daily trade limit reached ({trades})")
            }
            SkipReason::TakeProfitReached { daily_pnl } => {
                write!(f, "daily take-profit reached (${daily_pnl:.2})")
            }
            SkipReason::BelowThreshold { probability, confidence } => write!(
                f,
                "signal below thresholds (p={:.0}%, c={:.0}%)",
                probability * 100.0,
                confidence * 100.0
            ),
            SkipReason::TrendFilter { condition } => {
                write!(f, "contract opposes market condition ({condition})")
            }
            SkipReason::VolatilityFilter => write!(f, "volatile sideways market"),
            SkipReason::InsufficientBalance { balance } => {
                write!(f, "balance ${balance:.2} below minimum stake")
            }
            SkipReason::Paused => write!(f, "trading paused"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A stop rule fired; the caller should halt its loop.
    Halted(StopReason),
    Skipped(SkipReason),
    NoSignal,
    Opened(OpenContract),
}

/// Result of handling one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Contract settled against this bar, if one was open.
    pub settled: Option<Trade>,
    pub outcome: TickOutcome,
}

// ---------------------------------------------------------------------------
// Stake sizing
// ---------------------------------------------------------------------------

/// Final stake: the sizer's stake scaled by the signal multiplier, capped at
/// 5% of balance, floored at the minimum stake, never above the balance.
pub fn final_stake(base_stake: f64, multiplier: f64, balance: f64) -> f64 {
    let balance = balance.max(0.0);
    let stake = (base_stake * multiplier.max(0.0))
        .min(MAX_RISK_PCT * balance)
        .max(MIN_STAKE)
        .min(balance);
    (stake * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Trader
// ---------------------------------------------------------------------------

pub struct Trader {
    params: TradingParams,
    session: SessionWindow,
    engine: StrategyEngine,
    risk: RiskManager,
    history: VecDeque<PriceBar>,
    open: Option<OpenContract>,
    trades: Vec<Trade>,
}

impl Trader {
    pub fn new(params: TradingParams) -> Result<Self, BotError> {
        let params = params.clamped();
        let risk = RiskManager::new(
            RiskConfig { risk_tolerance: params.risk_tolerance },
            params.initial_balance,
        );
        Self::assemble(params, risk, Vec::new())
    }

    /// Resume from a persisted journal.
    pub fn restore(params: TradingParams, journal: TradeJournal) -> Result<Self, BotError> {
        let params = params.clamped();
        let risk = RiskManager::with_state(
            RiskConfig { risk_tolerance: params.risk_tolerance },
            journal.risk,
        );
        info!(
            market = %journal.market_id,
            trades = journal.trades.len(),
            balance = format!("${:.2}", risk.balance()),
            "Trader restored from journal"
        );
        Self::assemble(params, risk, journal.trades)
    }

    fn assemble(params: TradingParams, risk: RiskManager, trades: Vec<Trade>) -> Result<Self, BotError> {
        let session = params.session()?;
        Ok(Self {
            engine: StrategyEngine::new(params.strategy),
            history: VecDeque::with_capacity(params.history_limit),
            session,
            params,
            risk,
            open: None,
            trades,
        })
    }

    // -- accessors --

    pub fn params(&self) -> &TradingParams {
        &self.params
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn open_contract(&self) -> Option<&OpenContract> {
        self.open.as_ref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn strategy(&self) -> StrategyKind {
        self.engine.active()
    }

    pub fn set_strategy(&mut self, kind: StrategyKind) {
        self.engine.set_strategy(kind);
        self.params.strategy = kind;
    }

    /// Change the sizer's risk tolerance. Returns the clamped value in use.
    pub fn set_risk_tolerance(&mut self, risk_tolerance: f64) -> f64 {
        self.risk.set_risk_tolerance(risk_tolerance);
        self.params.risk_tolerance = self.risk.config().risk_tolerance;
        info!(risk_tolerance = self.params.risk_tolerance, "Risk tolerance updated");
        self.params.risk_tolerance
    }

    /// Trading day of the latest bar seen, falling back to the latest
    /// trade and then the wall clock. Daily totals are keyed the same way.
    pub fn trading_day(&self) -> NaiveDate {
        self.history
            .back()
            .map(|b| b.timestamp.date_naive())
            .or_else(|| self.trades.last().map(|t| t.timestamp.date_naive()))
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Snapshot for persistence.
    pub fn journal(&self) -> TradeJournal {
        TradeJournal {
            market_id: self.params.market.clone(),
            risk: self.risk.state().clone(),
            trades: self.trades.clone(),
        }
    }

    /// Current stop condition for `today`, if any.
    pub fn stop_reason(&self, today: NaiveDate) -> Option<StopReason> {
        self.risk.should_stop(today)
    }

    /// Market analysis over the analysis window; `None` until history is warm.
    pub fn market_snapshot(&self) -> Option<MarketSnapshot> {
        if self.history.len() < MIN_HISTORY {
            return None;
        }
        let history = self.history_vec();
        Some(market::analyze(self.window(&history)))
    }

    /// Blended pattern / multi-timeframe probability estimate for one
    /// contract type over the current history.
    pub fn estimate(&self, trade_type: TradeType) -> (f64, f64) {
        let history = self.history_vec();
        let timeframes = TimeframeSet::from_base(&history);
        probability::final_probability(
            self.window(&history),
            Some(&timeframes),
            trade_type,
            self.params.price_decimals,
        )
    }

    fn history_vec(&self) -> Vec<PriceBar> {
        self.history.iter().copied().collect()
    }

    /// Last `analysis_window` bars of `history`.
    fn window<'a>(&self, history: &'a [PriceBar]) -> &'a [PriceBar] {
        &history[history.len().saturating_sub(self.params.analysis_window)..]
    }

    // -- bar handling --

    /// Record the bar and settle any open contract against it.
    pub fn observe(&mut self, bar: PriceBar) -> Option<Trade> {
        if self.history.len() >= self.params.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(bar);

        let contract = self.open.take()?;
        let trade = contract.settle(&bar, self.params.payout_ratio, self.params.price_decimals);
        self.risk.record_trade(&trade);
        self.trades.push(trade.clone());
        Some(trade)
    }

    /// Handle a bar while trading is paused: settle, but never open.
    pub fn on_bar_paused(&mut self, bar: PriceBar) -> TickReport {
        TickReport {
            settled: self.observe(bar),
            outcome: TickOutcome::Skipped(SkipReason::Paused),
        }
    }

    /// Full event handler for one completed bar.
    pub fn on_bar(&mut self, bar: PriceBar) -> TickReport {
        let settled = self.observe(bar);
        let outcome = self.decide(&bar);
        match &outcome {
            TickOutcome::Opened(c) => info!(
                market = %c.market_id,
                contract = %c.trade_type,
                stake = format!("${:.2}", c.stake),
                probability = format!("{:.0}%", c.probability * 100.0),
                confidence = format!("{:.0}%", c.confidence * 100.0),
                strategy = %c.strategy,
                "Contract opened"
            ),
            TickOutcome::Halted(reason) => warn!(reason = %reason, "Trading halted"),
            TickOutcome::Skipped(reason) => debug!(reason = %reason, "Bar skipped"),
            TickOutcome::NoSignal => {}
        }
        TickReport { settled, outcome }
    }

    fn decide(&mut self, bar: &PriceBar) -> TickOutcome {
        let today = bar.timestamp.date_naive();
        if let Some(reason) = self.risk.should_stop(today) {
            return TickOutcome::Halted(reason);
        }
        if let Some(reason) = self.session_gate(bar) {
            return TickOutcome::Skipped(reason);
        }
        if self.history.len() < MIN_HISTORY {
            return TickOutcome::NoSignal;
        }

        let history = self.history_vec();
        let window = self.window(&history);
        let timeframes = if self.engine.active() == StrategyKind::MultiTimeframe {
            TimeframeSet::from_base(&history)
        } else {
            TimeframeSet::new()
        };

        let signal = self.engine.evaluate(window, &timeframes, &self.params.trade_types);
        let Some(trade_type) = signal.trade_type else {
            return TickOutcome::NoSignal;
        };

        if let Some(reason) = self.filter(&signal, window) {
            return TickOutcome::Skipped(reason);
        }

        let balance = self.risk.balance();
        if balance < MIN_STAKE {
            return TickOutcome::Skipped(SkipReason::InsufficientBalance { balance });
        }
        let volatility = market::normalized_volatility(window);
        let base = self.risk.optimal_stake(volatility, signal.probability);
        let stake = final_stake(base, signal.stake_multiplier, balance);

        let contract = OpenContract {
            market_id: self.params.market.clone(),
            trade_type,
            entry: bar.close,
            stake,
            probability: signal.probability,
            confidence: signal.confidence,
            strategy: self.engine.active().to_string(),
            opened_at: bar.timestamp,
        };
        self.open = Some(contract.clone());
        TickOutcome::Opened(contract)
    }

    fn session_gate(&self, bar: &PriceBar) -> Option<SkipReason> {
        let ts = bar.timestamp;
        if !self.session.contains(ts.weekday(), ts.time()) {
            return Some(SkipReason::OutsideSession);
        }
        let daily = self.risk.daily_totals(ts.date_naive());
        if daily.trades >= self.params.max_trades_per_day {
            return Some(SkipReason::DailyTradeLimit { trades: daily.trades });
        }
        if self.params.take_profit > 0.0 && daily.pnl >= self.params.take_profit {
            return Some(SkipReason::TakeProfitReached { daily_pnl: daily.pnl });
        }
        None
    }

    fn filter(&self, signal: &StrategySignal, window: &[PriceBar]) -> Option<SkipReason> {
        if signal.probability < self.params.probability_threshold
            || signal.confidence < self.params.confidence_threshold
        {
            return Some(SkipReason::BelowThreshold {
                probability: signal.probability,
                confidence: signal.confidence,
            });
        }

        let direction = signal.trade_type.map(|t| t.direction()).unwrap_or(Direction::Neutral);
        if direction == Direction::Neutral
            || !(self.params.use_trend_filter || self.params.use_volatility_filter)
        {
            return None;
        }

        let condition = market::assess(window);
        if self.params.use_trend_filter {
            let opposed = matches!(
                (direction, condition.direction()),
                (Direction::Bullish, Direction::Bearish) | (Direction::Bearish, Direction::Bullish)
            );
            if opposed {
                return Some(SkipReason::TrendFilter { condition });
            }
        }
        if self.params.use_volatility_filter && condition == MarketCondition::VolatileSideways {
            return Some(SkipReason::VolatilityFilter);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
