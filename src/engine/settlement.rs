//! One-bar contract settlement.
//!
//! A contract opened on one bar's close settles against the next bar's
//! close. Directional contracts compare exit with entry; digit contracts
//! look at the last digit of the exit quote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::indicators::digits::last_digit;
use crate::types::{Outcome, PriceBar, Trade, TradeType};

/// A purchased contract awaiting its exit quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenContract {
    pub market_id: String,
    pub trade_type: TradeType,
    pub entry: f64,
    pub stake: f64,
    pub probability: f64,
    pub confidence: f64,
    pub strategy: String,
    pub opened_at: DateTime<Utc>,
}

/// Whether `trade_type` wins when the quote moves from `entry` to `exit`.
pub fn contract_wins(trade_type: TradeType, entry: f64, exit: f64, decimals: u32) -> bool {
    match trade_type {
        TradeType::Call | TradeType::Rise => exit > entry,
        TradeType::Put | TradeType::Fall => exit < entry,
        TradeType::DigitEven => last_digit(exit, decimals) % 2 == 0,
        TradeType::DigitOdd => last_digit(exit, decimals) % 2 == 1,
        TradeType::DigitMatch(d) => last_digit(exit, decimals) == d,
    }
}

/// Net result of a settled contract: `stake * payout_ratio` on a win,
/// `-stake` on a loss.
pub fn payout(stake: f64, outcome: Outcome, payout_ratio: f64) -> f64 {
    let pnl = match outcome {
        Outcome::Win => stake * payout_ratio,
        Outcome::Loss => -stake,
    };
    (pnl * 100.0).round() / 100.0
}

impl OpenContract {
    /// Settle against the exit bar and produce the immutable trade record.
    pub fn settle(&self, exit: &PriceBar, payout_ratio: f64, decimals: u32) -> Trade {
        let outcome = if contract_wins(self.trade_type, self.entry, exit.close, decimals) {
            Outcome::Win
        } else {
            Outcome::Loss
        };
        let profit_loss = payout(self.stake, outcome, payout_ratio);

        info!(
            market = %self.market_id,
            contract = %self.trade_type,
            entry = self.entry,
            exit = exit.close,
            outcome = %outcome,
            pnl = format!("${:.2}", profit_loss),
            "Contract settled"
        );

        Trade {
            id: Uuid::new_v4().to_string(),
            timestamp: exit.timestamp,
            market_id: self.market_id.clone(),
            trade_type: self.trade_type,
            strategy: self.strategy.clone(),
            stake: self.stake,
            outcome,
            profit_loss,
            probability: self.probability,
            confidence: self.confidence,
        }
    }
}
