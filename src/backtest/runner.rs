//! Historical backtesting engine.
//!
//! Replays a bar series through a fresh `Trader` exactly as the live loop
//! would, then summarises the result: P&L, win rate, Sharpe ratio and max
//! drawdown.

use serde::Serialize;
use tracing::info;

use crate::config::TradingParams;
use crate::engine::accountant::{max_drawdown, Drawdown, PerformanceMetrics};
use crate::engine::trader::{TickOutcome, Trader};
use crate::strategy::risk::StopReason;
use crate::types::{BotError, PriceBar, Trade};

// ---------------------------------------------------------------------------
// Backtest results
// ---------------------------------------------------------------------------

/// Complete backtest performance report.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_pnl: f64,
    pub return_pct: f64,
    pub metrics: PerformanceMetrics,
    pub max_drawdown: Drawdown,
    pub sharpe_ratio: f64,
    /// Stop rule that ended the run early, if any.
    pub halted: Option<StopReason>,
    /// Balance after each settled trade, starting with the initial balance.
    pub balance_history: Vec<f64>,
    pub trades: Vec<Trade>,
}

impl BacktestReport {
    pub fn log_summary(&self) {
        info!(
            initial = format!("${:.2}", self.initial_balance),
            final_balance = format!("${:.2}", self.final_balance),
            return_pct = format!("{:.2}%", self.return_pct),
            trades = self.metrics.total_trades,
            win_rate = format!("{:.1}%", self.metrics.win_rate * 100.0),
            sharpe = format!("{:.2}", self.sharpe_ratio),
            max_drawdown = format!("{:.1}%", self.max_drawdown.pct * 100.0),
            halted = self.halted.is_some(),
            "Backtest complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

pub struct Backtester {
    params: TradingParams,
}

impl Backtester {
    pub fn new(params: TradingParams, initial_balance: f64) -> Self {
        Self {
            params: TradingParams { initial_balance, ..params },
        }
    }

    /// Run the trader over `bars` (chronological order). Stops at the first
    /// bar on which a stop rule fires. A contract still open after the last
    /// bar is left unsettled.
    pub fn run(&self, bars: &[PriceBar]) -> Result<BacktestReport, BotError> {
        let mut trader = Trader::new(self.params.clone())?;
        let initial_balance = trader.risk().balance();
        let mut balance_history = vec![initial_balance];
        let mut halted = None;

        for bar in bars {
            let report = trader.on_bar(*bar);
            if report.settled.is_some() {
                balance_history.push(trader.risk().balance());
            }
            if let TickOutcome::Halted(reason) = report.outcome {
                halted = Some(reason);
                break;
            }
        }

        let trades = trader.trades().to_vec();
        let returns: Vec<f64> = trades
            .iter()
            .map(|t| t.profit_loss / t.stake.max(0.01))
            .collect();

        let final_balance = trader.risk().balance();
        let return_pct = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance * 100.0
        } else {
            0.0
        };

        Ok(BacktestReport {
            initial_balance,
            final_balance,
            total_pnl: trades.iter().map(|t| t.profit_loss).sum(),
            return_pct,
            metrics: PerformanceMetrics::from_trades(&trades),
            max_drawdown: max_drawdown(&balance_history),
            sharpe_ratio: compute_sharpe(&returns),
            halted,
            balance_history,
            trades,
        })
    }
}

/// Compute annualized Sharpe ratio from a series of per-trade returns.
pub fn compute_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev < 1e-10 {
        return 0.0;
    }

    // One-minute contracts: ~250 trading days of ~24 trades each.
    let annualization_factor = (250.0_f64 * 24.0).sqrt();
    (mean / std_dev) * annualization_factor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
