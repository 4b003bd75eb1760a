//! Non-payment detection: declared tax due vs transfers actually relayed.
//!
//! The per-company revenue check and the fleet-wide detector below share
//! `assess_non_payment`, so both paths agree on the same data.

use crate::{
    divergence::{Divergence, DivergenceKind, ResultBundle},
    error::CrossingResult,
    period::Competency,
    severity::{percent_of, SHORTFALL_BANDS},
    store::{DeclarationRow, FiscalStore, TransferRow},
    tolerance::{amount_tolerance, PAYMENT_FLOOR, PAYMENT_PCT},
    types::{Amount, KIND_PGDAS},
};
use std::collections::{BTreeMap, HashMap};

/// Declarations with tax due at or below this are not chased.
pub const MIN_TAX_DUE: Amount = 100.0;

/// Sum of transfers whose free text mentions `tax_id`.
pub fn matched_transfer_total(transfers: &[TransferRow], tax_id: &str) -> Amount {
    transfers
        .iter()
        .filter(|t| t.mentions(tax_id))
        .map(|t| t.amount)
        .sum()
}

pub fn assess_non_payment(tax_due: Amount, paid: Amount, competency: Competency) -> Option<Divergence> {
    if tax_due <= MIN_TAX_DUE {
        return None;
    }
    let shortfall = tax_due - paid;
    if shortfall <= amount_tolerance(tax_due, PAYMENT_FLOOR, PAYMENT_PCT) {
        return None;
    }
    let severity = SHORTFALL_BANDS.classify(percent_of(shortfall, tax_due));
    Some(Divergence::new(
        DivergenceKind::Inadimplente,
        severity,
        shortfall,
        Some(competency),
        format!(
            "Declared tax due {tax_due:.2} for {} but only {paid:.2} was relayed (shortfall {shortfall:.2})",
            competency.public_label()
        ),
    ))
}

/// Latest ordinary filing per company for `competency`.
fn latest_filings_for(
    declarations: Vec<DeclarationRow>,
    competency: Competency,
) -> BTreeMap<String, DeclarationRow> {
    let mut latest = BTreeMap::new();
    // Input is ordered oldest first, so later inserts win.
    for d in declarations {
        if d.competency() == Some(competency) {
            latest.insert(d.company_id.clone(), d);
        }
    }
    latest
}

/// Fleet-wide non-payment for one period, one bundle per delinquent company.
pub fn detect_delinquent(store: &FiscalStore, competency: Competency) -> CrossingResult<Vec<ResultBundle>> {
    let companies: HashMap<_, _> = store
        .list_companies()?
        .into_iter()
        .map(|c| (c.company_id.clone(), c))
        .collect();
    let latest = latest_filings_for(store.declarations_of_kind(KIND_PGDAS)?, competency);
    let (start, end) = competency.window();
    let transfers = store.transfers_between(start, end)?;

    let mut out = Vec::new();
    for (company_id, declaration) in latest {
        let Some(company) = companies.get(&company_id) else {
            log::warn!("declaration {} references unknown company {company_id}", declaration.declaration_id);
            continue;
        };
        let paid = matched_transfer_total(&transfers, &company.tax_id);
        if let Some(d) = assess_non_payment(declaration.tax_due, paid, competency) {
            out.push(ResultBundle::new(company, vec![d]));
        }
    }
    log::debug!("{competency}: {} delinquent companies", out.len());
    Ok(out)
}
