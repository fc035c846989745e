//! VOLBOT: binary-options trading core for synthetic volatility indices.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod backtest;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod indicators;
pub mod storage;
pub mod strategy;
pub mod types;
