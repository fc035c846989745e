//! One step of the live loop: pull a bar, hand it to the shared trader,
//! persist and update the bot status.

use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

use crate::dashboard::{ApiState, BotStatus};

use super::feed::MarketFeed;
use super::trader::TickOutcome;

/// Pull one bar from the feed and run it through the trader.
/// Returns `false` once the loop should end (halted, stopped or feed dry).
pub async fn process_next_bar<F: MarketFeed + ?Sized>(
    feed: &mut F,
    state: &ApiState,
    journal_path: &Path,
) -> Result<bool> {
    if state.status.read().await.is_terminal() {
        return Ok(false);
    }

    let Some(bar) = feed.next_bar().await? else {
        info!(market = feed.market_id(), "Feed exhausted");
        return Ok(false);
    };

    // Status is re-read after the fetch so a pause issued meanwhile applies.
    let status = *state.status.read().await;
    let mut trader = state.trader.write().await;
    let report = if status == BotStatus::Paused {
        trader.on_bar_paused(bar)
    } else {
        trader.on_bar(bar)
    };

    if report.settled.is_some() {
        if let Err(e) = trader.journal().save(journal_path) {
            error!(error = %e, "Failed to save journal");
        }
    }

    if let TickOutcome::Halted(reason) = report.outcome {
        *state.status.write().await = BotStatus::Halted;
        warn!(
            reason = %reason,
            balance = format!("${:.2}", trader.risk().balance()),
            "Bot halted"
        );
        return Ok(false);
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
