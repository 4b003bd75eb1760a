//! Withholding / rate validation (per company, per month).
//!
//! Design:
//!   - effective rate = tax due / declared revenue (0 when revenue is 0)
//!   - per withheld invoice: explicit rate → rate in raw payload → default
//!   - |effective - average withheld rate| > 0.5pp → ALIQUOTA_DIVERGENTE
//!   - Σ expected withheld vs tax due beyond 5% → RETENCAO_INVALIDA
//!   - Only invoices flagged as withheld take part. Companies flagged
//!     withholding-exempt are not checked.

use crate::{
    check::{CheckContext, CompanyCheck},
    divergence::{Divergence, DivergenceKind},
    error::CrossingResult,
    matching::{extract_rate, normalize_rate},
    period::Competency,
    severity::Severity,
    store::{DeclarationRow, InvoiceRow},
    tolerance::WITHHOLDING_PCT,
    types::{Amount, KIND_PGDAS},
};

/// Rate gap (as a fraction) above which rates are considered divergent.
pub const RATE_GAP_TOLERANCE: f64 = 0.005;
/// Rate gap above which the divergence is HIGH.
pub const RATE_GAP_HIGH: f64 = 0.02;
/// Withheld-amount gap above which the divergence is HIGH.
pub const WITHHELD_GAP_HIGH: Amount = 1_000.0;

pub struct WithholdingCheck;

impl CompanyCheck for WithholdingCheck {
    fn name(&self) -> &'static str {
        "withholding"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CrossingResult<Vec<Divergence>> {
        let company = ctx.company;
        if company.withholding_exempt {
            log::debug!("{}: withholding-exempt, skipped", company.company_id);
            return Ok(Vec::new());
        }

        let declarations = ctx
            .store
            .declarations_for_company(&company.company_id, KIND_PGDAS)?;
        let Some(declaration) = declarations
            .iter()
            .filter(|d| d.competency() == Some(ctx.competency))
            .last()
        else {
            return Ok(Vec::new());
        };

        let (start, end) = ctx.competency.window();
        let invoices = ctx
            .store
            .invoices_for_company_between(&company.company_id, start, end)?;

        Ok(assess_withholding(
            declaration,
            &invoices,
            ctx.config.default_withholding_rate,
            ctx.competency,
        ))
    }
}

pub fn effective_rate(declaration: &DeclarationRow) -> f64 {
    if declaration.declared_revenue > 0.0 {
        declaration.tax_due / declaration.declared_revenue
    } else {
        0.0
    }
}

/// Withheld rate for one invoice, as a fraction.
pub fn derived_rate(invoice: &InvoiceRow, default_rate: f64) -> f64 {
    invoice
        .rate
        .and_then(normalize_rate)
        .or_else(|| invoice.raw_payload.as_deref().and_then(extract_rate))
        .unwrap_or(default_rate)
}

/// Explicit withheld amount when present, else value × derived rate.
pub fn expected_withheld(invoice: &InvoiceRow, default_rate: f64) -> Amount {
    match invoice.withheld_amount {
        Some(amount) if amount > 0.0 => amount,
        _ => invoice.value * derived_rate(invoice, default_rate),
    }
}

/// Both withholding assessments over one filing and its invoices.
pub fn assess_withholding<'a>(
    declaration: &DeclarationRow,
    invoices: impl IntoIterator<Item = &'a InvoiceRow>,
    default_rate: f64,
    competency: Competency,
) -> Vec<Divergence> {
    let withheld: Vec<&InvoiceRow> = invoices.into_iter().filter(|i| i.tax_withheld).collect();
    if withheld.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    out.extend(assess_rate(declaration, &withheld, default_rate, competency));
    out.extend(assess_withheld_amount(declaration, &withheld, default_rate, competency));
    out
}

pub fn assess_rate(
    declaration: &DeclarationRow,
    withheld: &[&InvoiceRow],
    default_rate: f64,
    competency: Competency,
) -> Option<Divergence> {
    if withheld.is_empty() {
        return None;
    }
    let effective = effective_rate(declaration);
    let average = withheld
        .iter()
        .map(|i| derived_rate(i, default_rate))
        .sum::<f64>()
        / withheld.len() as f64;
    let gap = (effective - average).abs();
    if gap <= RATE_GAP_TOLERANCE {
        return None;
    }
    let severity = if gap > RATE_GAP_HIGH { Severity::High } else { Severity::Medium };
    let base: Amount = withheld.iter().map(|i| i.value).sum();
    Some(Divergence::new(
        DivergenceKind::AliquotaDivergente,
        severity,
        gap * base,
        Some(competency),
        format!(
            "{}: effective declared rate {:.2}% vs average withheld rate {:.2}% over {} invoices",
            competency.public_label(),
            effective * 100.0,
            average * 100.0,
            withheld.len(),
        ),
    ))
}

pub fn assess_withheld_amount(
    declaration: &DeclarationRow,
    withheld: &[&InvoiceRow],
    default_rate: f64,
    competency: Competency,
) -> Option<Divergence> {
    if withheld.is_empty() {
        return None;
    }
    let expected: Amount = withheld.iter().map(|i| expected_withheld(i, default_rate)).sum();
    let declared = declaration.tax_due;
    let gap = (expected - declared).abs();
    if gap <= declared.max(expected) * WITHHOLDING_PCT {
        return None;
    }
    let severity = if gap > WITHHELD_GAP_HIGH { Severity::High } else { Severity::Medium };
    Some(Divergence::new(
        DivergenceKind::RetencaoInvalida,
        severity,
        gap,
        Some(competency),
        format!(
            "{}: withheld on invoices {expected:.2} vs declared tax due {declared:.2} (gap {gap:.2})",
            competency.public_label()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn comp() -> Competency {
        Competency::new(2025, 5).unwrap()
    }

    fn declaration(revenue: f64, tax: f64) -> DeclarationRow {
        DeclarationRow {
            declaration_id: "d1".into(),
            company_id: "c-1".into(),
            period: "05/2025".into(),
            kind: KIND_PGDAS.into(),
            declared_revenue: revenue,
            tax_due: tax,
            receipt_code: None,
            auth_code: None,
            raw_payload: None,
            created_at: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn withheld(value: f64, rate: Option<f64>, amount: Option<f64>, payload: Option<&str>) -> InvoiceRow {
        InvoiceRow {
            invoice_id: format!("nf-{value}"),
            company_id: "c-1".into(),
            number: None,
            value,
            issue_date: NaiveDate::from_ymd_opt(2025, 5, 5).unwrap(),
            service_code: None,
            tax_withheld: true,
            withheld_amount: amount,
            rate,
            service_municipality: None,
            payer_tax_id: None,
            raw_payload: payload.map(str::to_string),
        }
    }

    #[test]
    fn rate_resolution_order() {
        let explicit = withheld(100.0, Some(2.0), None, Some("aliquota: 3"));
        let from_payload = withheld(100.0, None, None, Some("aliquota: 3"));
        let fallback = withheld(100.0, None, None, Some("<x>?</x>"));
        assert_eq!(derived_rate(&explicit, 0.05), 0.02);
        assert_eq!(derived_rate(&from_payload, 0.05), 0.03);
        assert_eq!(derived_rate(&fallback, 0.05), 0.05);
    }

    #[test]
    fn no_withheld_invoices_means_no_findings() {
        let mut plain = withheld(10_000.0, None, None, None);
        plain.tax_withheld = false;
        assert!(assess_withholding(&declaration(10_000.0, 100.0), [&plain], 0.05, comp()).is_empty());
    }

    #[test]
    fn consistent_filing_is_clean() {
        // 5% declared, 5% withheld, amounts match.
        let invoices = vec![withheld(10_000.0, Some(0.05), Some(500.0), None)];
        assert!(assess_withholding(&declaration(10_000.0, 500.0), &invoices, 0.05, comp()).is_empty());
    }

    #[test]
    fn rate_gap_severity() {
        // effective 2% vs withheld 5% → 3pp → high
        let invoices = [withheld(10_000.0, Some(0.05), None, None)];
        let refs: Vec<&InvoiceRow> = invoices.iter().collect();
        let d = assess_rate(&declaration(10_000.0, 200.0), &refs, 0.05, comp()).unwrap();
        assert_eq!(d.kind, DivergenceKind::AliquotaDivergente);
        assert_eq!(d.severity, Severity::High);

        // effective 4% vs 5% → 1pp → medium
        let d = assess_rate(&declaration(10_000.0, 400.0), &refs, 0.05, comp()).unwrap();
        assert_eq!(d.severity, Severity::Medium);

        // effective 4.8% vs 5% → within 0.5pp
        assert!(assess_rate(&declaration(10_000.0, 480.0), &refs, 0.05, comp()).is_none());
    }

    #[test]
    fn withheld_amount_gap() {
        let invoices = [withheld(100_000.0, Some(0.05), None, None)];
        let refs: Vec<&InvoiceRow> = invoices.iter().collect();
        // expected 5000 vs declared 2000 → gap 3000 > 250 → high
        let d = assess_withheld_amount(&declaration(100_000.0, 2_000.0), &refs, 0.05, comp()).unwrap();
        assert_eq!(d.kind, DivergenceKind::RetencaoInvalida);
        assert_eq!(d.severity, Severity::High);
        assert!((d.value - 3_000.0).abs() < 1e-6);
        // expected 5000 vs declared 4900 → gap 100 ≤ 250
        assert!(assess_withheld_amount(&declaration(100_000.0, 4_900.0), &refs, 0.05, comp()).is_none());
    }
}
