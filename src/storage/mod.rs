//! Persistence layer.
//!
//! The trade journal (risk state plus trade log for one market) is kept as a
//! single pretty-printed JSON document.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{RiskState, Trade};

/// Everything needed to resume trading a market after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeJournal {
    pub market_id: String,
    pub risk: RiskState,
    pub trades: Vec<Trade>,
}

impl TradeJournal {
    /// Write the journal to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialise trade journal")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write journal to {}", path.display()))?;

        debug!(
            path = %path.display(),
            balance = format!("${:.2}", self.risk.balance),
            trades = self.trades.len(),
            "Journal saved"
        );
        Ok(())
    }

    /// Load a journal. Returns None if the file doesn't exist (fresh start).
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No journal found, starting fresh");
            return Ok(None);
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read journal from {}", path.display()))?;
        let journal: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse journal from {}", path.display()))?;

        info!(
            path = %path.display(),
            market = %journal.market_id,
            balance = format!("${:.2}", journal.risk.balance),
            trades = journal.trades.len(),
            "Journal loaded from disk"
        );
        Ok(Some(journal))
    }

    /// Delete the journal file. A missing file is not an error.
    pub fn delete(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to delete journal {}", path.display()))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
