//! Tolerance bands for "close enough" currency comparisons.
//!
//! Currency aggregates are never compared for exact equality: a difference
//! only counts when it exceeds `max(absolute floor, base * percentage)`.

use crate::types::Amount;

/// Declared revenue vs invoiced revenue.
pub const REVENUE_FLOOR: Amount = 100.0;
pub const REVENUE_PCT: f64 = 0.02;

/// Declared tax due vs amounts actually relayed.
pub const PAYMENT_FLOOR: Amount = 50.0;
pub const PAYMENT_PCT: f64 = 0.05;

/// Expected withheld tax vs declared tax due (no floor).
pub const WITHHOLDING_PCT: f64 = 0.05;

/// `max(absolute_floor, base * percentage)`.
pub fn amount_tolerance(base: Amount, absolute_floor: Amount, percentage: f64) -> Amount {
    absolute_floor.max(base * percentage)
}

/// True when `a` and `b` differ by more than the tolerance computed on `base`.
pub fn exceeds_tolerance(a: Amount, b: Amount, base: Amount, absolute_floor: Amount, percentage: f64) -> bool {
    (a - b).abs() > amount_tolerance(base, absolute_floor, percentage)
}
