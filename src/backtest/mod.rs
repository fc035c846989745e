//! Offline replay of bar series through the trader.

pub mod runner;

pub use runner::{BacktestReport, Backtester};
