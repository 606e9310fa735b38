//! Price quantization.
//!
//! The marketplace only accepts prices from a fixed stepped domain; every
//! heuristic that produces a price goes through the ladder before it is
//! sent anywhere.

pub mod ladder;

pub use ladder::{MAX_PRICE, MIN_PRICE};
