//! Trading engine: bar feeds, contract settlement, the per-market trader
//! and its accounting.

pub mod accountant;
pub mod feed;
pub mod runner;
pub mod settlement;
pub mod trader;
