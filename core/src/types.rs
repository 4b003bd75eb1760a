//! Shared primitive types used across the crossing engine.

/// Store identifier of a company record.
pub type CompanyId = String;

/// Monetary amount in decimal currency units.
pub type Amount = f64;

/// Ordinary monthly self-assessment filing.
pub const KIND_PGDAS: &str = "PGDAS";

/// Rounding guard used whenever two currency amounts are compared for
/// "strictly lower".
pub const CURRENCY_EPSILON: Amount = 0.01;
