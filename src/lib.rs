//! ARBSCAN: cross-exchange and triangular crypto arbitrage detector
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod exchanges;
pub mod engine;
pub mod storage;
