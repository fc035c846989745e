//! Accountant: performance metrics over the trade log and equity curve.

use serde::Serialize;
use tracing::info;

use crate::types::Trade;

// ---------------------------------------------------------------------------
// Drawdown
// ---------------------------------------------------------------------------

/// Largest peak-to-trough decline of an equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Drawdown {
    /// Currency units.
    pub amount: f64,
    /// Fraction of the running peak (0.25 = 25%).
    pub pct: f64,
}

/// Max drawdown against the running maximum. Fewer than two points → zero.
pub fn max_drawdown(equity: &[f64]) -> Drawdown {
    if equity.len() < 2 {
        return Drawdown::default();
    }
    let mut peak = f64::NEG_INFINITY;
    let mut worst = Drawdown::default();
    for value in equity {
        peak = peak.max(*value);
        let amount = peak - value;
        let pct = if peak > 0.0 { amount / peak } else { 0.0 };
        worst.amount = worst.amount.max(amount);
        worst.pct = worst.pct.max(pct);
    }
    worst
}

// ---------------------------------------------------------------------------
// Performance metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub net_profit: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Gross profit over gross loss. 1.0 with no P/L at all, infinite (JSON
    /// `null`) when there are only wins.
    pub profit_factor: f64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            net_profit: 0.0,
            average_win: 0.0,
            average_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            profit_factor: 1.0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }
}

/// Gross profit / gross loss over the trades' P/L.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades.iter().map(|t| t.profit_loss).filter(|p| *p > 0.0).sum();
    let gross_loss: f64 = trades.iter().map(|t| t.profit_loss).filter(|p| *p < 0.0).sum::<f64>().abs();

    if gross_loss == 0.0 {
        return if gross_profit == 0.0 { 1.0 } else { f64::INFINITY };
    }
    gross_profit / gross_loss
}

impl PerformanceMetrics {
    /// Compute metrics over a trade log in settlement order.
    pub fn from_trades(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let wins: Vec<f64> = trades.iter().filter(|t| t.is_win()).map(|t| t.profit_loss).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| !t.is_win()).map(|t| -t.profit_loss).collect();

        let mut metrics = Self {
            total_trades: trades.len(),
            wins: wins.len(),
            losses: losses.len(),
            win_rate: wins.len() as f64 / trades.len() as f64,
            net_profit: trades.iter().map(|t| t.profit_loss).sum(),
            average_win: mean(&wins),
            average_loss: mean(&losses),
            largest_win: wins.iter().cloned().fold(0.0, f64::max),
            largest_loss: losses.iter().cloned().fold(0.0, f64::max),
            profit_factor: profit_factor(trades),
            ..Self::default()
        };

        for trade in trades {
            if trade.is_win() {
                metrics.consecutive_wins += 1;
                metrics.consecutive_losses = 0;
                metrics.max_consecutive_wins = metrics.max_consecutive_wins.max(metrics.consecutive_wins);
            } else {
                metrics.consecutive_losses += 1;
                metrics.consecutive_wins = 0;
                metrics.max_consecutive_losses =
                    metrics.max_consecutive_losses.max(metrics.consecutive_losses);
            }
        }
        metrics
    }

    pub fn log_summary(&self) {
        info!(
            trades = self.total_trades,
            win_rate = format!("{:.1}%", self.win_rate * 100.0),
            net_profit = format!("${:.2}", self.net_profit),
            profit_factor = format!("{:.2}", self.profit_factor),
            max_losing_run = self.max_consecutive_losses,
            "Performance summary"
        );
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
