//! Per-company and fleet-wide sections of the multi-year report.

use super::{
    AmountBucket, AnnualAuxFlag, CompanyFinding, CompanyRef, CrossMunicipality, Delinquency, InvoicedMonth,
    LateFiling, MultiYearReport, OriginTotal, OverdueInstallment, ReportIndex, SublimitBreach,
    SuspendedFinding, WithheldVsGuide,
};
use crate::{
    config::CrossingConfig,
    delinquency_check::assess_non_payment,
    divergence::DivergenceKind,
    matching::same_municipality,
    period::Competency,
    report::FiscalSnapshot,
    revenue_check::{assess_downward_amendment, assess_revenue_omission, place_of_service},
    store::{AnnualAuxRow, CompanyRow, DeclarationRow, InvoiceRow, TransferRow},
    sublimit_check::{annual_declared_revenue, assess_sublimits},
    tolerance::{amount_tolerance, PAYMENT_FLOOR, PAYMENT_PCT},
    types::{Amount, CURRENCY_EPSILON},
    withholding_check::{assess_withholding, expected_withheld},
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Lower bounds of the transfer amount buckets.
pub const TRANSFER_BUCKETS: [(&str, Amount); 4] = [
    ("0-5k", 0.0),
    ("5k-20k", 5_000.0),
    ("20k-50k", 20_000.0),
    ("50k+", 50_000.0),
];

pub const NO_ORIGIN_LABEL: &str = "(no origin)";

/// Installment statuses that mean nothing is owed any more.
pub const SETTLED_INSTALLMENT_STATUSES: [&str; 3] = ["PAGA", "PAGO", "QUITADA"];

/// One company-month as the sections see it.
struct MonthView<'r, 'a> {
    company: &'a CompanyRow,
    competency: Competency,
    filings: &'r [&'a DeclarationRow],
    invoices: &'r [&'a InvoiceRow],
    invoiced: Amount,
}

impl MonthView<'_, '_> {
    fn invoiced_month(&self) -> InvoicedMonth {
        InvoicedMonth {
            company: self.company.into(),
            competency: self.competency,
            invoiced: self.invoiced,
            invoice_count: self.invoices.len(),
        }
    }
}

/// Active simplified-regime company: the population expected to file.
fn is_tracked(company: &CompanyRow, config: &CrossingConfig) -> bool {
    company.status == config.active_status && company.tax_regime == config.simplified_regime
}

/// Months before the company started operating are never flagged.
fn has_started(company: &CompanyRow, competency: Competency) -> bool {
    company
        .activity_start
        .map_or(true, |start| competency >= Competency::of_date(start))
}

pub fn scan_company_months<'a>(
    report: &mut MultiYearReport,
    index: &ReportIndex<'a>,
    config: &CrossingConfig,
    company: &'a CompanyRow,
    competencies: &[Competency],
) {
    let id = company.company_id.as_str();
    let tracked = is_tracked(company, config);
    for &competency in competencies {
        let invoices = index.invoices_of(id, competency);
        let month = MonthView {
            company,
            competency,
            filings: index.filings_of(id, competency),
            invoices,
            invoiced: invoices.iter().map(|i| i.value).sum(),
        };

        match month.filings.last() {
            Some(latest) => filed_month(report, index, config, &month, latest),
            None if tracked && has_started(company, competency) => {
                report.omissions.push(month.invoiced_month());
            }
            None => {}
        }

        if !company.withholding_exempt {
            withheld_vs_guide(report, index, config, &month);
        }
        annual_aux_month(report, config, &month, index.annual_aux_of(id, competency), tracked);
    }
}

fn filed_month(
    report: &mut MultiYearReport,
    index: &ReportIndex<'_>,
    config: &CrossingConfig,
    month: &MonthView<'_, '_>,
    latest: &DeclarationRow,
) {
    let company = month.company;
    let competency = month.competency;
    let finding = |divergence| CompanyFinding {
        company: company.into(),
        divergence,
    };

    if latest.declared_revenue.abs() <= CURRENCY_EPSILON {
        if month.invoiced > CURRENCY_EPSILON {
            report.zero_revenue_with_invoices.push(month.invoiced_month());
        } else if month.invoices.is_empty() {
            report.no_movement.push(month.invoiced_month());
        }
    } else if let Some(divergence) = assess_revenue_omission(latest.declared_revenue, month.invoiced, competency) {
        match index.plan_cover.get(&(company.company_id.as_str(), competency)) {
            Some(plan) => report.suspended_by_installment.push(SuspendedFinding {
                company: company.into(),
                plan_id: plan.plan_id.clone(),
                plan_number: plan.plan_number.clone(),
                divergence,
            }),
            None => report.revenue_divergences.push(finding(divergence)),
        }
    }

    if let Some(divergence) = assess_downward_amendment(month.filings, competency) {
        report.downward_amendments.push(finding(divergence));
    }

    if !company.withholding_exempt {
        let found = assess_withholding(
            latest,
            month.invoices.iter().copied(),
            config.default_withholding_rate,
            competency,
        );
        for divergence in found {
            match divergence.kind {
                DivergenceKind::AliquotaDivergente => report.rate_divergences.push(finding(divergence)),
                _ => report.withholding_divergences.push(finding(divergence)),
            }
        }
    }

    let paid = index.paid(company.company_id.as_str(), competency);
    if let Some(divergence) = assess_non_payment(latest.tax_due, paid, competency) {
        report.delinquency.push(Delinquency {
            company: company.into(),
            tax_due: latest.tax_due,
            paid,
            divergence,
        });
    }

    // Lateness is judged on the original filing.
    if let Some(original) = month.filings.first() {
        let due_date = competency.filing_due_date();
        let filed_on = original.created_at.date();
        let days_late = (filed_on - due_date).num_days();
        if days_late > config.late_filing_threshold_days {
            report.late_filings.push(LateFiling {
                company: company.into(),
                competency,
                declaration_id: original.declaration_id.clone(),
                due_date,
                filed_on,
                days_late,
            });
        }
    }
}

/// Withheld tax on invoices that never reached a paid guide.
fn withheld_vs_guide(
    report: &mut MultiYearReport,
    index: &ReportIndex<'_>,
    config: &CrossingConfig,
    month: &MonthView<'_, '_>,
) {
    let invoice_withheld: Amount = month
        .invoices
        .iter()
        .filter(|i| i.tax_withheld)
        .map(|i| expected_withheld(i, config.default_withholding_rate))
        .sum();
    if invoice_withheld <= CURRENCY_EPSILON {
        return;
    }
    let guide_withheld = index
        .guides_withheld
        .get(&(month.company.company_id.as_str(), month.competency))
        .copied()
        .unwrap_or(0.0);
    let shortfall = invoice_withheld - guide_withheld;
    if shortfall > amount_tolerance(invoice_withheld, PAYMENT_FLOOR, PAYMENT_PCT) {
        report.withheld_vs_guides.push(WithheldVsGuide {
            company: month.company.into(),
            competency: month.competency,
            invoice_withheld,
            guide_withheld,
            shortfall,
        });
    }
}

fn annual_aux_month(
    report: &mut MultiYearReport,
    config: &CrossingConfig,
    month: &MonthView<'_, '_>,
    rows: &[&AnnualAuxRow],
    tracked: bool,
) {
    if rows.is_empty() {
        if tracked && has_started(month.company, month.competency) && month.invoiced > CURRENCY_EPSILON {
            report.dasd_omissions.push(month.invoiced_month());
        }
        return;
    }

    let flag = |row: &AnnualAuxRow| AnnualAuxFlag {
        company: month.company.into(),
        competency: month.competency,
        dasd_id: row.dasd_id.clone(),
        municipality_of_incidence: row.municipality_of_incidence.clone(),
        declared_revenue: row.declared_revenue,
    };
    for &row in rows {
        if row.special_regime {
            report.special_regime_flags.push(flag(row));
        }
        if row.accounting_activity {
            report.accounting_activity_flags.push(flag(row));
        }
        let incidence = row
            .municipality_of_incidence
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if let (Some(home), Some(incidence)) = (config.home_municipality.as_deref(), incidence) {
            if !same_municipality(incidence, home) {
                report.dasd_municipality_mismatches.push(flag(row));
            }
        }
    }
}

/// Invoices placed outside the home municipality, one entry per
/// (company, municipality) over the whole window.
pub fn cross_municipality<'a>(
    report: &mut MultiYearReport,
    index: &ReportIndex<'a>,
    config: &CrossingConfig,
    company: &'a CompanyRow,
    competencies: &[Competency],
) {
    let Some(home) = config.home_municipality.as_deref() else {
        return;
    };
    let id = company.company_id.as_str();
    let mut by_place: BTreeMap<String, (CrossMunicipality, BTreeSet<Competency>)> = BTreeMap::new();
    for &competency in competencies {
        for invoice in index.invoices_of(id, competency) {
            let Some(place) = place_of_service(invoice) else {
                continue;
            };
            if same_municipality(&place, home) {
                continue;
            }
            let (entry, months) = by_place.entry(place.to_lowercase()).or_insert_with(|| {
                (
                    CrossMunicipality {
                        company: company.into(),
                        municipality: place.clone(),
                        invoiced: 0.0,
                        invoice_count: 0,
                        competencies: Vec::new(),
                    },
                    BTreeSet::new(),
                )
            });
            entry.invoiced += invoice.value;
            entry.invoice_count += 1;
            months.insert(competency);
        }
    }
    report.cross_municipality.extend(by_place.into_values().map(|(mut entry, months)| {
        entry.competencies = months.into_iter().collect();
        entry
    }));
}

/// Calendar years touched by the window, each judged on the whole year.
pub fn sublimit_breaches<'a>(
    report: &mut MultiYearReport,
    index: &ReportIndex<'a>,
    config: &CrossingConfig,
    company: &'a CompanyRow,
    competencies: &[Competency],
) {
    let Some(filings) = index.filings_by_company.get(company.company_id.as_str()) else {
        return;
    };
    let years: BTreeSet<i32> = competencies.iter().map(Competency::year).collect();
    for year in years {
        let annual = annual_declared_revenue(filings.iter().copied(), year);
        for divergence in assess_sublimits(annual, year, config) {
            report.sublimit_breaches.push(SublimitBreach {
                company: company.into(),
                year,
                annual_revenue: annual,
                divergence,
            });
        }
    }
}

pub fn overdue_installments(snapshot: &FiscalSnapshot, today: NaiveDate) -> Vec<OverdueInstallment> {
    let companies: HashMap<&str, &CompanyRow> = snapshot
        .companies
        .iter()
        .map(|c| (c.company_id.as_str(), c))
        .collect();
    let mut out = Vec::new();
    for plan in snapshot.plans.iter().filter(|p| p.is_in_force()) {
        let Some(company) = companies.get(plan.company_id.as_str()) else {
            log::warn!("installment plan {} references unknown company {}", plan.plan_id, plan.company_id);
            continue;
        };
        for installment in &plan.installments {
            let settled = SETTLED_INSTALLMENT_STATUSES
                .iter()
                .any(|s| s.eq_ignore_ascii_case(installment.status.trim()));
            let outstanding = installment.amount - installment.paid_amount;
            if settled || installment.due_date >= today || outstanding <= CURRENCY_EPSILON {
                continue;
            }
            out.push(OverdueInstallment {
                company: CompanyRef::from(*company),
                plan_id: plan.plan_id.clone(),
                plan_number: plan.plan_number.clone(),
                seq: installment.seq,
                due_date: installment.due_date,
                amount: installment.amount,
                paid_amount: installment.paid_amount,
                days_overdue: (today - installment.due_date).num_days(),
            });
        }
    }
    out
}

pub fn transfer_buckets(transfers: &[TransferRow]) -> Vec<AmountBucket> {
    let mut buckets: Vec<AmountBucket> = TRANSFER_BUCKETS
        .iter()
        .map(|(label, _)| AmountBucket {
            label: label.to_string(),
            count: 0,
            total: 0.0,
        })
        .collect();
    for t in transfers {
        let slot = TRANSFER_BUCKETS
            .iter()
            .rposition(|(_, lower)| t.amount >= *lower)
            .unwrap_or(0);
        buckets[slot].count += 1;
        buckets[slot].total += t.amount;
    }
    buckets
}

/// Totals per origin label, largest first.
pub fn transfers_by_origin(transfers: &[TransferRow]) -> Vec<OriginTotal> {
    let mut by_origin: BTreeMap<&str, (usize, Amount)> = BTreeMap::new();
    for t in transfers {
        let origin = t
            .origin
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(NO_ORIGIN_LABEL);
        let (count, total) = by_origin.entry(origin).or_default();
        *count += 1;
        *total += t.amount;
    }
    let mut out: Vec<OriginTotal> = by_origin
        .into_iter()
        .map(|(origin, (count, total))| OriginTotal {
            origin: origin.to_string(),
            count,
            total,
        })
        .collect();
    out.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.origin.cmp(&b.origin)));
    out
}
