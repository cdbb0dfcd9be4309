//! EDGECOACH — AI Trading Psychology Coach
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod types;
