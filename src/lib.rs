//! TRADEPILOT: automated trading agent for a virtual transfer market.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod market;
pub mod notify;
pub mod pricing;
pub mod session;
pub mod storage;
pub mod strategy;
pub mod types;
