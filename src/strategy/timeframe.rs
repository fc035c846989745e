//! Multi-timeframe bar sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::indicators::resample;
use crate::types::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M1, Timeframe::M5, Timeframe::M15, Timeframe::H1];

    /// Timeframes that must all be present for confluence analysis.
    pub const CONFLUENCE: [Timeframe; 3] = [Timeframe::M1, Timeframe::M5, Timeframe::M15];

    pub fn minutes(&self) -> usize {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Price bars keyed by timeframe.
#[derive(Debug, Clone, Default)]
pub struct TimeframeSet {
    series: BTreeMap<Timeframe, Vec<PriceBar>>,
}

impl TimeframeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every timeframe by resampling 1-minute bars.
    pub fn from_base(one_minute: &[PriceBar]) -> Self {
        let mut set = Self::new();
        for tf in Timeframe::ALL {
            set.insert(tf, resample(one_minute, tf.minutes()));
        }
        set
    }

    pub fn insert(&mut self, timeframe: Timeframe, bars: Vec<PriceBar>) {
        self.series.insert(timeframe, bars);
    }

    pub fn with(mut self, timeframe: Timeframe, bars: Vec<PriceBar>) -> Self {
        self.insert(timeframe, bars);
        self
    }

    pub fn get(&self, timeframe: Timeframe) -> Option<&[PriceBar]> {
        self.series.get(&timeframe).map(Vec::as_slice)
    }

    /// Bars for `timeframe` if at least `min_len` are available.
    pub fn get_min(&self, timeframe: Timeframe, min_len: usize) -> Option<&[PriceBar]> {
        self.get(timeframe).filter(|bars| bars.len() >= min_len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timeframe, &[PriceBar])> {
        self.series.iter().map(|(tf, bars)| (*tf, bars.as_slice()))
    }
}
