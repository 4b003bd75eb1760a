//! Check trait and the context every per-company check receives.
//!
//! RULE: Every per-company check implements CompanyCheck.
//! The composite crossing calls run() on each registered check in
//! registration order; the order is fixed and documented in engine.rs.
//! Checks read through the store and never write.

use crate::{
    config::CrossingConfig,
    divergence::Divergence,
    error::CrossingResult,
    period::Competency,
    store::{CompanyRow, FiscalStore},
};

pub struct CheckContext<'a> {
    pub store: &'a FiscalStore,
    pub config: &'a CrossingConfig,
    pub company: &'a CompanyRow,
    pub competency: Competency,
}

/// The contract every per-company check must fulfill.
pub trait CompanyCheck: Send {
    /// Unique stable name, used in logs.
    fn name(&self) -> &'static str;

    /// Compare the sources this check owns for `ctx.company` over
    /// `ctx.competency` and return every divergence found.
    fn run(&self, ctx: &CheckContext<'_>) -> CrossingResult<Vec<Divergence>>;
}
