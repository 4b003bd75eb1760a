//! Sublimit check (per company, per calendar year).
//!
//! The annual declared revenue (latest filing per month) is compared with
//! the state and the municipal sublimits independently; each breach is a
//! separate SUBLIMITE_EXCEDIDO.

use crate::{
    check::{CheckContext, CompanyCheck},
    config::CrossingConfig,
    divergence::{Divergence, DivergenceKind},
    error::CrossingResult,
    period::Competency,
    severity::{percent_of, SHORTFALL_BANDS},
    store::{CompanyRow, DeclarationRow, FiscalStore},
    types::{Amount, KIND_PGDAS},
};
use std::collections::BTreeMap;

pub struct SublimitCheck;

impl SublimitCheck {
    pub fn for_year(
        store: &FiscalStore,
        config: &CrossingConfig,
        company: &CompanyRow,
        year: i32,
    ) -> CrossingResult<Vec<Divergence>> {
        let declarations = store.declarations_for_company(&company.company_id, KIND_PGDAS)?;
        let annual = annual_declared_revenue(&declarations, year);
        Ok(assess_sublimits(annual, year, config))
    }
}

impl CompanyCheck for SublimitCheck {
    fn name(&self) -> &'static str {
        "sublimits"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CrossingResult<Vec<Divergence>> {
        Self::for_year(ctx.store, ctx.config, ctx.company, ctx.competency.year())
    }
}

/// Per-month authoritative revenue for `year`, keyed by competency.
/// `declarations` must be ordered oldest first.
pub fn monthly_revenue<'a>(
    declarations: impl IntoIterator<Item = &'a DeclarationRow>,
    year: i32,
) -> BTreeMap<Competency, Amount> {
    let mut by_month = BTreeMap::new();
    for d in declarations {
        if let Some(c) = d.competency().filter(|c| c.year() == year) {
            by_month.insert(c, d.declared_revenue);
        }
    }
    by_month
}

pub fn annual_declared_revenue<'a>(
    declarations: impl IntoIterator<Item = &'a DeclarationRow>,
    year: i32,
) -> Amount {
    monthly_revenue(declarations, year).values().sum()
}

pub fn assess_sublimits(annual: Amount, year: i32, config: &CrossingConfig) -> Vec<Divergence> {
    [
        ("state", config.state_sublimit),
        ("municipal", config.municipal_sublimit),
    ]
    .into_iter()
    .filter(|(_, threshold)| annual > *threshold)
    .map(|(scope, threshold)| {
        let excess = annual - threshold;
        let pct = percent_of(excess, threshold);
        Divergence::new(
            DivergenceKind::SublimiteExcedido,
            SHORTFALL_BANDS.classify(pct),
            excess,
            None,
            format!(
                "{year}: declared revenue {annual:.2} exceeds the {scope} sublimit {threshold:.2} by {excess:.2} ({pct:.1}%)"
            ),
        )
    })
    .collect()
}
