//! Mock feed for integration testing.
//!
//! Provides a deterministic in-memory `MarketFeed` that serves a scripted
//! bar sequence and can be forced to fail.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use volbot::engine::feed::MarketFeed;
use volbot::types::PriceBar;

/// A scripted market feed.
///
/// Clones share state, so a test can keep a handle for pushing bars or
/// injecting errors while the loop owns another.
#[derive(Clone)]
pub struct ScriptedFeed {
    market_id: String,
    bars: Arc<Mutex<VecDeque<PriceBar>>>,
    pulled: Arc<Mutex<usize>>,
    /// If set, `next_bar` returns this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl ScriptedFeed {
    pub fn new(market_id: &str, bars: Vec<PriceBar>) -> Self {
        Self {
            market_id: market_id.to_string(),
            bars: Arc::new(Mutex::new(bars.into())),
            pulled: Arc::new(Mutex::new(0)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn push(&self, bar: PriceBar) {
        self.bars.lock().unwrap().push_back(bar);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn pulled(&self) -> usize {
        *self.pulled.lock().unwrap()
    }

    pub fn remaining(&self) -> usize {
        self.bars.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketFeed for ScriptedFeed {
    async fn next_bar(&mut self) -> Result<Option<PriceBar>> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        let bar = self.bars.lock().unwrap().pop_front();
        if bar.is_some() {
            *self.pulled.lock().unwrap() += 1;
        }
        Ok(bar)
    }

    fn market_id(&self) -> &str {
        &self.market_id
    }
}

// ---------------------------------------------------------------------------
// Bar builders
// ---------------------------------------------------------------------------

/// Tuesday 2024-06-04 00:00 UTC.
pub fn session_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap()
}

/// One-minute bars with the given closes, starting at `session_start`.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| {
            PriceBar::new(session_start() + Duration::minutes(i as i64), *c, c + 0.5, c - 0.5, *c)
        })
        .collect()
}

/// Steadily falling closes: 6000, 5999, ...
pub fn falling(n: usize) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..n).map(|i| 6000.0 - i as f64).collect();
    bars_from_closes(&closes)
}
