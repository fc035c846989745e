//! Risk manager and stake sizer.
//!
//! Converts a win probability plus account state (balance, streaks, daily
//! P/L) into a bounded stake, and decides when the bot should stop trading.
//! Stop decisions are advisory: the caller halts its loop.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::types::{DailyTotals, RiskState, Trade};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Baseline fraction of balance risked per trade at full risk tolerance.
pub const BASE_RISK_PCT: f64 = 0.02;
pub const MIN_RISK_PCT: f64 = 0.005;
pub const MAX_RISK_PCT: f64 = 0.05;
/// Smallest stake the broker accepts.
pub const MIN_STAKE: f64 = 1.0;

/// Balance below this share of the initial balance halts trading.
pub const DRAWDOWN_STOP: f64 = 0.75;
pub const MAX_LOSS_STREAK: u32 = 5;
/// Daily loss, as a share of the initial balance, that halts trading.
pub const DAILY_LOSS_LIMIT: f64 = 0.10;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Scales the baseline risk; clamped to [0.1, 1.0].
    pub risk_tolerance: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_tolerance: 0.5, // Half of the 2% baseline
        }
    }
}

// ---------------------------------------------------------------------------
// Stake sizing
// ---------------------------------------------------------------------------

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fraction of balance to risk, clamped to `[MIN_RISK_PCT, MAX_RISK_PCT]`.
///
/// Starts from `BASE_RISK_PCT * risk_tolerance`, scales down with
/// volatility, up or down with the probability edge over 0.5, then applies
/// the win-streak boost (more than 2 wins) or loss-streak damping (more
/// than 1 loss).
pub fn risk_fraction(
    risk_tolerance: f64,
    volatility: f64,
    probability: f64,
    win_streak: u32,
    loss_streak: u32,
) -> f64 {
    let risk_tolerance = risk_tolerance.clamp(0.1, 1.0);
    let volatility = volatility.clamp(0.1, 1.0);
    let probability = probability.clamp(0.1, 1.0);

    let mut pct = BASE_RISK_PCT * risk_tolerance;
    pct *= 1.0 - 0.5 * volatility;
    pct *= 1.0 + ((probability - 0.5) * 2.0).clamp(-0.5, 1.0);

    if win_streak > 2 {
        pct *= (1.0 + 0.1 * win_streak as f64).min(1.5);
    } else if loss_streak > 1 {
        pct *= (1.0 - 0.2 * loss_streak as f64).max(0.5);
    }

    pct.clamp(MIN_RISK_PCT, MAX_RISK_PCT)
}

/// Stake for one trade: `balance * risk_fraction(..)`, rounded to cents and
/// floored at [`MIN_STAKE`]. A negative balance is treated as zero.
pub fn optimal_stake(
    balance: f64,
    risk_tolerance: f64,
    volatility: f64,
    probability: f64,
    win_streak: u32,
    loss_streak: u32,
) -> f64 {
    let balance = balance.max(0.0);
    let pct = risk_fraction(risk_tolerance, volatility, probability, win_streak, loss_streak);
    round_cents(balance * pct).max(MIN_STAKE)
}

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

/// Why trading should stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    Drawdown { balance: f64, initial_balance: f64 },
    LossStreak { streak: u32 },
    DailyLossLimit { daily_pnl: f64, limit: f64 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Drawdown { balance, initial_balance } => write!(
                f,
                "Severe drawdown: balance ${balance:.2} is below {:.0}% of initial ${initial_balance:.2}",
                DRAWDOWN_STOP * 100.0
            ),
            StopReason::LossStreak { streak } => {
                write!(f, "Excessive consecutive losses ({streak})")
            }
            StopReason::DailyLossLimit { daily_pnl, limit } => write!(
                f,
                "Daily loss limit exceeded: ${daily_pnl:.2} (limit -${limit:.2})"
            ),
        }
    }
}

/// Check the stop rules in order: drawdown, loss streak, daily loss.
///
/// All comparisons on money are strict, so a balance of exactly 75% of the
/// initial balance keeps trading.
pub fn should_stop(
    balance: f64,
    initial_balance: f64,
    loss_streak: u32,
    daily_pnl: f64,
) -> Option<StopReason> {
    if balance < initial_balance * DRAWDOWN_STOP {
        return Some(StopReason::Drawdown { balance, initial_balance });
    }
    if loss_streak >= MAX_LOSS_STREAK {
        return Some(StopReason::LossStreak { streak: loss_streak });
    }
    let limit = initial_balance * DAILY_LOSS_LIMIT;
    if daily_pnl < -limit {
        return Some(StopReason::DailyLossLimit { daily_pnl, limit });
    }
    None
}

// ---------------------------------------------------------------------------
// Risk manager
// ---------------------------------------------------------------------------

/// Owns the running [`RiskState`] and applies the sizing and stop rules to it.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
}

impl RiskManager {
    pub fn new(config: RiskConfig, initial_balance: f64) -> Self {
        Self::with_state(config, RiskState::new(initial_balance))
    }

    /// Resume from a persisted state.
    pub fn with_state(mut config: RiskConfig, state: RiskState) -> Self {
        config.risk_tolerance = config.risk_tolerance.clamp(0.1, 1.0);
        Self { config, state }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    pub fn set_risk_tolerance(&mut self, risk_tolerance: f64) {
        self.config.risk_tolerance = risk_tolerance.clamp(0.1, 1.0);
    }

    /// Replace the balance (e.g. after a broker sync). Clamped at zero.
    pub fn update_balance(&mut self, new_balance: f64) {
        self.state.balance = new_balance.max(0.0);
        if self.state.balance > self.state.peak_balance {
            self.state.peak_balance = self.state.balance;
        }
    }

    /// Book a settled trade: streaks, daily totals, balance and peak.
    pub fn record_trade(&mut self, trade: &Trade) {
        if trade.is_win() {
            self.state.win_streak += 1;
            self.state.loss_streak = 0;
        } else {
            self.state.loss_streak += 1;
            self.state.win_streak = 0;
        }

        let daily = self.state.daily_totals.entry(trade.date()).or_default();
        daily.trades += 1;
        daily.pnl += trade.profit_loss;
        if trade.is_win() {
            daily.wins += 1;
        } else {
            daily.losses += 1;
        }

        self.update_balance(self.state.balance + trade.profit_loss);

        debug!(
            trade_id = %trade.id,
            outcome = %trade.outcome,
            pnl = format!("${:.2}", trade.profit_loss),
            balance = format!("${:.2}", self.state.balance),
            win_streak = self.state.win_streak,
            loss_streak = self.state.loss_streak,
            "Trade recorded"
        );

        if self.state.loss_streak > 1 {
            info!(loss_streak = self.state.loss_streak, "Loss streak: stakes damped");
        }
    }

    /// Stake for the next trade given the current balance and streaks.
    pub fn optimal_stake(&self, volatility: f64, probability: f64) -> f64 {
        optimal_stake(
            self.state.balance,
            self.config.risk_tolerance,
            volatility,
            probability,
            self.state.win_streak,
            self.state.loss_streak,
        )
    }

    pub fn daily_totals(&self, date: NaiveDate) -> DailyTotals {
        self.state.daily(date)
    }

    pub fn daily_pnl(&self, date: NaiveDate) -> f64 {
        self.state.daily(date).pnl
    }

    /// Evaluate the stop rules against `today`'s P/L.
    pub fn should_stop(&self, today: NaiveDate) -> Option<StopReason> {
        let reason = should_stop(
            self.state.balance,
            self.state.initial_balance,
            self.state.loss_streak,
            self.daily_pnl(today),
        );
        if let Some(r) = &reason {
            warn!(reason = %r, "Stop condition reached");
        }
        reason
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
