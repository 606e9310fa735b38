//! The marketplace price ladder.
//!
//! `[0, MAX_PRICE]` is partitioned into buckets, each with its own step
//! size; a price is valid only when it is an exact multiple of the step of
//! the bucket it falls in. Rounding ties go to the even multiple, matching
//! the reference client byte for byte (the marketplace rejects anything
//! off the ladder).

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

use crate::types::Price;

/// Lowest price the marketplace lists anything for.
pub const MIN_PRICE: Price = 150;

/// Highest accepted price.
pub const MAX_PRICE: Price = 15_000_000;

/// `(exclusive upper bound, step size)`, cheapest bucket first.
const BUCKETS: [(Price, Price); 4] = [(1_000, 50), (10_000, 100), (50_000, 250), (100_000, 500)];

/// Step size at and above the last bucket.
const TOP_STEP: Price = 1_000;

/// Clamp a price into `[0, MAX_PRICE]`.
pub fn bound(price: impl Into<Decimal>) -> Decimal {
    let price: Decimal = price.into();
    price.clamp(Decimal::ZERO, Decimal::from(MAX_PRICE))
}

/// Step size of the bucket containing `price`.
pub fn step_size(price: Price) -> Price {
    BUCKETS
        .iter()
        .find(|(upper, _)| price < *upper)
        .map_or(TOP_STEP, |(_, step)| *step)
}

/// Round to the nearest ladder value.
///
/// The bucket is chosen from the clamped input, so `990` rounds with the
/// 50-step bucket (to `1000`) even though the result lives in the next one.
pub fn round(price: impl Into<Decimal>) -> Price {
    let clamped = bound(price);
    let step = Decimal::from(step_size(clamped.trunc().to_u64().unwrap_or(0)));
    let multiple = (clamped / step).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    (multiple * step).to_u64().unwrap_or(0)
}

/// Move `steps` ladder positions from `round(price)`; negative steps move
/// down.
///
/// The step size is re-derived at every position, so a walk can change
/// stride mid-way when it crosses a bucket boundary. Going down from a
/// bucket's upper bound uses that bucket's (smaller) step: `step(1000, -1)`
/// is `950`, not `900`.
pub fn step(price: impl Into<Decimal>, steps: i32) -> Price {
    let mut value = round(price) as i64;
    for _ in 0..steps.unsigned_abs() {
        if steps > 0 {
            value += stride_up(value);
        } else {
            value -= stride_down(value);
        }
    }
    value.clamp(0, MAX_PRICE as i64) as Price
}

fn stride_up(value: i64) -> i64 {
    BUCKETS
        .iter()
        .find(|(upper, _)| value < *upper as i64)
        .map_or(TOP_STEP, |(_, step)| *step) as i64
}

fn stride_down(value: i64) -> i64 {
    BUCKETS
        .iter()
        .find(|(upper, _)| value <= *upper as i64)
        .map_or(TOP_STEP, |(_, step)| *step) as i64
}

/// Whether `price` is exactly on the ladder.
pub fn is_valid(price: Price) -> bool {
    price <= MAX_PRICE && round(price) == price
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
