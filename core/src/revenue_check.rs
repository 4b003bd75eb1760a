//! Revenue-vs-invoices check (per company, per month).
//!
//! Design:
//!   - Authoritative filing = latest ordinary filing for the competency
//!   - ≥2 filings and the latest lowers revenue or tax → RETIFICACAO_A_MENOR
//!   - |invoiced - declared| > max(100, 2% declared) → OMISSAO_RECEITA
//!   - Invoiced outside the home municipality > 0 → MUNICIPIO_DIVERGENTE
//!   - Tax due not covered by matched transfers → INADIMPLENTE
//!   - No filing at all → neutral (omission is a separate check)

use crate::{
    check::{CheckContext, CompanyCheck},
    delinquency_check::{assess_non_payment, matched_transfer_total},
    divergence::{Divergence, DivergenceKind},
    error::CrossingResult,
    matching::{extract_municipality, same_municipality},
    period::Competency,
    severity::{percent_of, Severity, AMENDMENT_BANDS, OMISSION_BANDS},
    store::{DeclarationRow, InvoiceRow},
    tolerance::{exceeds_tolerance, REVENUE_FLOOR, REVENUE_PCT},
    types::{Amount, CURRENCY_EPSILON, KIND_PGDAS},
};

/// Invoiced amount elsewhere above which the mismatch is HIGH.
pub const MUNICIPALITY_HIGH_THRESHOLD: Amount = 10_000.0;

pub struct RevenueCheck;

impl CompanyCheck for RevenueCheck {
    fn name(&self) -> &'static str {
        "revenue_vs_invoices"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CrossingResult<Vec<Divergence>> {
        let company = ctx.company;
        let competency = ctx.competency;

        let declarations = ctx
            .store
            .declarations_for_company(&company.company_id, KIND_PGDAS)?;
        let filings = filings_for(&declarations, competency);
        let Some(latest) = filings.last().copied() else {
            return Ok(Vec::new());
        };

        let (start, end) = competency.window();
        let invoices = ctx
            .store
            .invoices_for_company_between(&company.company_id, start, end)?;
        let transfers = ctx.store.transfers_between(start, end)?;

        let mut out = Vec::new();
        out.extend(assess_downward_amendment(&filings, competency));

        let invoiced: Amount = invoices.iter().map(|i| i.value).sum();
        out.extend(assess_revenue_omission(latest.declared_revenue, invoiced, competency));

        if let Some(home) = ctx.config.home_municipality.as_deref() {
            out.extend(assess_municipality(home, &invoices, competency));
        }

        let paid = matched_transfer_total(&transfers, &company.tax_id);
        out.extend(assess_non_payment(latest.tax_due, paid, competency));

        Ok(out)
    }
}

/// Filings for `competency` in their original (oldest first) order.
/// Filings whose period does not parse are skipped.
pub fn filings_for(declarations: &[DeclarationRow], competency: Competency) -> Vec<&DeclarationRow> {
    declarations
        .iter()
        .filter(|d| d.competency() == Some(competency))
        .collect()
}

/// Compare the first filing against the latest one.
pub fn assess_downward_amendment(filings: &[&DeclarationRow], competency: Competency) -> Option<Divergence> {
    let (first, latest) = match filings {
        [first, .., latest] => (*first, *latest),
        _ => return None,
    };

    let revenue_drop = first.declared_revenue - latest.declared_revenue;
    let tax_drop = first.tax_due - latest.tax_due;
    let revenue_lowered = revenue_drop > CURRENCY_EPSILON;
    let tax_lowered = tax_drop > CURRENCY_EPSILON;
    if !revenue_lowered && !tax_lowered {
        return None;
    }

    let revenue_pct = if revenue_lowered { percent_of(revenue_drop, first.declared_revenue) } else { 0.0 };
    let tax_pct = if tax_lowered { percent_of(tax_drop, first.tax_due) } else { 0.0 };
    let reduction_pct = revenue_pct.max(tax_pct);
    let value = if revenue_lowered { revenue_drop } else { tax_drop };

    Some(Divergence::new(
        DivergenceKind::RetificacaoAMenor,
        AMENDMENT_BANDS.classify(reduction_pct),
        value,
        Some(competency),
        format!(
            "Amendment for {} lowered revenue {:.2} → {:.2} and tax due {:.2} → {:.2} ({reduction_pct:.1}% reduction across {} filings)",
            competency.public_label(),
            first.declared_revenue,
            latest.declared_revenue,
            first.tax_due,
            latest.tax_due,
            filings.len(),
        ),
    ))
}

pub fn assess_revenue_omission(declared: Amount, invoiced: Amount, competency: Competency) -> Option<Divergence> {
    if !exceeds_tolerance(invoiced, declared, declared, REVENUE_FLOOR, REVENUE_PCT) {
        return None;
    }
    let difference = invoiced - declared;
    let gap = difference.abs();
    let pct = percent_of(gap, declared);
    let direction = if difference > 0.0 {
        "invoices exceed declared revenue"
    } else {
        "declared revenue exceeds invoices"
    };
    Some(Divergence::new(
        DivergenceKind::OmissaoReceita,
        OMISSION_BANDS.classify(pct),
        gap,
        Some(competency),
        format!(
            "{}: {direction} by {gap:.2} (declared {declared:.2}, invoiced {invoiced:.2}, {pct:.1}%)",
            competency.public_label()
        ),
    ))
}

/// Place of service: the structured field, else whatever the raw payload
/// says. `None` means unknown and the invoice is left out.
pub fn place_of_service(invoice: &InvoiceRow) -> Option<String> {
    invoice
        .service_municipality
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .or_else(|| invoice.raw_payload.as_deref().and_then(extract_municipality))
}

/// Total invoiced in municipalities other than `home`.
pub fn invoiced_elsewhere<'a>(home: &str, invoices: impl IntoIterator<Item = &'a InvoiceRow>) -> Amount {
    invoices
        .into_iter()
        .filter(|i| matches!(place_of_service(i), Some(m) if !same_municipality(&m, home)))
        .map(|i| i.value)
        .sum()
}

pub fn assess_municipality<'a>(
    home: &str,
    invoices: impl IntoIterator<Item = &'a InvoiceRow>,
    competency: Competency,
) -> Option<Divergence> {
    let elsewhere = invoiced_elsewhere(home, invoices);
    if elsewhere <= 0.0 {
        return None;
    }
    let severity = if elsewhere > MUNICIPALITY_HIGH_THRESHOLD {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Divergence::new(
        DivergenceKind::MunicipioDivergente,
        severity,
        elsewhere,
        Some(competency),
        format!(
            "{}: {elsewhere:.2} invoiced with place of service outside {home}",
            competency.public_label()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn comp() -> Competency {
        Competency::new(2024, 3).unwrap()
    }

    fn filing(id: &str, revenue: f64, tax: f64, day: u32) -> DeclarationRow {
        DeclarationRow {
            declaration_id: id.into(),
            company_id: "c-1".into(),
            period: "03/2024".into(),
            kind: KIND_PGDAS.into(),
            declared_revenue: revenue,
            tax_due: tax,
            receipt_code: None,
            auth_code: None,
            raw_payload: None,
            created_at: NaiveDate::from_ymd_opt(2024, 4, day).unwrap().and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    fn invoice(value: f64, municipality: Option<&str>, payload: Option<&str>) -> InvoiceRow {
        InvoiceRow {
            invoice_id: format!("nf-{value}"),
            company_id: "c-1".into(),
            number: None,
            value,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            service_code: None,
            tax_withheld: false,
            withheld_amount: None,
            rate: None,
            service_municipality: municipality.map(str::to_string),
            payer_tax_id: None,
            raw_payload: payload.map(str::to_string),
        }
    }

    #[test]
    fn downward_amendment_uses_first_and_latest() {
        let a = filing("d1", 50_000.0, 5_000.0, 1);
        let b = filing("d2", 45_000.0, 4_500.0, 2);
        let c = filing("d3", 30_000.0, 3_000.0, 3);
        let d = assess_downward_amendment(&[&a, &b, &c], comp()).unwrap();
        assert_eq!(d.kind, DivergenceKind::RetificacaoAMenor);
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.value, 20_000.0);
    }

    #[test]
    fn upward_or_single_filing_is_not_flagged() {
        let a = filing("d1", 30_000.0, 3_000.0, 1);
        let b = filing("d2", 50_000.0, 5_000.0, 2);
        assert!(assess_downward_amendment(&[&a, &b], comp()).is_none());
        assert!(assess_downward_amendment(&[&a], comp()).is_none());
        let same = filing("d3", 29_999.995, 3_000.0, 3);
        assert!(assess_downward_amendment(&[&a, &same], comp()).is_none());
    }

    #[test]
    fn tax_only_reduction_is_classified_on_tax() {
        let a = filing("d1", 10_000.0, 1_000.0, 1);
        let b = filing("d2", 10_000.0, 880.0, 2);
        let d = assess_downward_amendment(&[&a, &b], comp()).unwrap();
        assert_eq!(d.severity, Severity::High);
        assert!((d.value - 120.0).abs() < 1e-9);
    }

    #[test]
    fn omission_direction_does_not_change_severity() {
        let up = assess_revenue_omission(10_000.0, 13_000.0, comp()).unwrap();
        let down = assess_revenue_omission(10_000.0, 7_000.0, comp()).unwrap();
        assert_eq!(up.severity, Severity::High);
        assert_eq!(down.severity, Severity::High);
        assert_ne!(up.description, down.description);
    }

    #[test]
    fn omission_within_tolerance_is_ignored() {
        assert!(assess_revenue_omission(10_000.0, 10_150.0, comp()).is_none());
        assert!(assess_revenue_omission(1_000.0, 1_099.0, comp()).is_none());
    }

    #[test]
    fn municipality_falls_back_to_payload_and_skips_unknown() {
        let invoices = vec![
            invoice(4_000.0, Some("CAMPINAS"), None),
            invoice(6_000.0, None, Some(r#"{"municipioPrestacao":"Sumaré"}"#)),
            invoice(9_000.0, None, None),
            invoice(8_000.0, Some("Valinhos"), None),
        ];
        let d = assess_municipality("Campinas", &invoices, comp()).unwrap();
        assert_eq!(d.value, 14_000.0);
        assert_eq!(d.severity, Severity::High);
        assert!(assess_municipality("Campinas", &invoices[..1], comp()).is_none());
    }

    #[test]
    fn omission_boundary_is_strict() {
        assert!(assess_revenue_omission(10_000.0, 10_200.0, comp()).is_none());
        assert!(assess_revenue_omission(10_000.0, 9_800.0, comp()).is_none());
        assert!(assess_revenue_omission(10_000.0, 10_200.5, comp()).is_some());
    }

    #[test]
    fn numeric_municipality_code_in_payload_is_skipped() {
        let invoices = vec![invoice(
            7_000.0,
            None,
            Some("<Servico><CodigoMunicipio>3509502</CodigoMunicipio></Servico>"),
        )];
        assert_eq!(place_of_service(&invoices[0]), None);
        assert!(assess_municipality("Campinas", &invoices, comp()).is_none());
    }
}
