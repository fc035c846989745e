//! Market-data feeds.
//!
//! Defines the `MarketFeed` trait the trading loop pulls bars from, and a
//! replay implementation backed by a JSON file of recorded bars.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{BotError, PriceBar};

/// Source of completed price bars for one market.
#[async_trait]
pub trait MarketFeed: Send {
    /// Next completed bar, or `None` once the feed is exhausted.
    async fn next_bar(&mut self) -> Result<Option<PriceBar>>;

    /// Market symbol served by this feed (e.g. `R_10`).
    fn market_id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Replay feed
// ---------------------------------------------------------------------------

/// Replays recorded bars in timestamp order.
pub struct ReplayFeed {
    market_id: String,
    bars: VecDeque<PriceBar>,
}

impl ReplayFeed {
    pub fn new(market_id: &str, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            market_id: market_id.to_string(),
            bars: bars.into(),
        }
    }

    /// Load a JSON array of bars from disk.
    pub fn from_file(market_id: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bars = load_bars(path)?;
        info!(market = market_id, bars = bars.len(), path = %path.display(), "Replay feed loaded");
        Ok(Self::new(market_id, bars))
    }

    pub fn remaining(&self) -> usize {
        self.bars.len()
    }
}

/// Read recorded bars from a JSON array file, sorted by timestamp.
/// A bar whose low is above its high rejects the whole file.
pub fn load_bars(path: impl AsRef<Path>) -> Result<Vec<PriceBar>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bar file: {}", path.display()))?;
    let mut bars: Vec<PriceBar> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse bar file: {}", path.display()))?;

    if let Some(bad) = bars.iter().find(|b| b.low > b.high) {
        return Err(BotError::Feed(format!("bar with low above high at {}", bad.timestamp)).into());
    }
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

#[async_trait]
impl MarketFeed for ReplayFeed {
    async fn next_bar(&mut self) -> Result<Option<PriceBar>> {
        let bar = self.bars.pop_front();
        if bar.is_none() {
            debug!(market = %self.market_id, "Replay feed exhausted");
        }
        Ok(bar)
    }

    fn market_id(&self) -> &str {
        &self.market_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
