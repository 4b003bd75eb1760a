//! Missing-declaration detection (fleet-wide, per period).
//!
//! omitted = active simplified-regime companies \ companies with an
//! ordinary filing for the period. Each omitted company gets one OMISSO
//! divergence: fixed HIGH severity, zero value (a flag, not a valuation).

use crate::{
    config::CrossingConfig,
    divergence::{Divergence, DivergenceKind, ResultBundle},
    error::CrossingResult,
    period::Competency,
    severity::Severity,
    store::{CompanyRow, DeclarationRow, FiscalStore},
    types::KIND_PGDAS,
};
use std::collections::HashSet;

pub fn omission_divergence(competency: Competency) -> Divergence {
    Divergence::new(
        DivergenceKind::Omisso,
        Severity::High,
        0.0,
        Some(competency),
        format!("No ordinary filing for {}", competency.public_label()),
    )
}

/// Companies from `active` without a filing for `competency`, in input order.
pub fn omitted_companies<'a>(
    active: &'a [CompanyRow],
    declarations: &[DeclarationRow],
    competency: Competency,
) -> Vec<&'a CompanyRow> {
    let declared: HashSet<&str> = declarations
        .iter()
        .filter(|d| d.competency() == Some(competency))
        .map(|d| d.company_id.as_str())
        .collect();
    active
        .iter()
        .filter(|c| !declared.contains(c.company_id.as_str()))
        .collect()
}

pub fn detect_omitted(
    store: &FiscalStore,
    config: &CrossingConfig,
    competency: Competency,
) -> CrossingResult<Vec<ResultBundle>> {
    let active = store.list_companies_by_status_regime(&config.active_status, &config.simplified_regime)?;
    let declarations = store.declarations_of_kind(KIND_PGDAS)?;
    let out: Vec<ResultBundle> = omitted_companies(&active, &declarations, competency)
        .into_iter()
        .map(|c| ResultBundle::new(c, vec![omission_divergence(competency)]))
        .collect();
    log::debug!("{competency}: {} of {} active companies omitted", out.len(), active.len());
    Ok(out)
}
