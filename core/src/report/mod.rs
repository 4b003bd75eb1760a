//! Multi-year aggregate report.
//!
//! Read-only. One snapshot of every source over the window, one index
//! pass, then each section is computed from the index. Revenue, amendment,
//! withholding, non-payment and sublimit findings use the same assessors
//! as the per-company checks, so both paths agree on the same data.

mod index;
mod sections;

pub use index::{FiscalSnapshot, MonthKey, ReportIndex};

use crate::{
    clock::CrossingClock,
    config::CrossingConfig,
    divergence::Divergence,
    error::{CrossingError, CrossingResult},
    period::Competency,
    store::{CompanyRow, FiscalStore},
    types::{Amount, CompanyId},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const MAX_YEARS_BACK: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub company_id: CompanyId,
    pub tax_id: String,
    pub legal_name: String,
}

impl From<&CompanyRow> for CompanyRef {
    fn from(c: &CompanyRow) -> Self {
        Self {
            company_id: c.company_id.clone(),
            tax_id: c.tax_id.clone(),
            legal_name: c.legal_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFinding {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub divergence: Divergence,
}

/// A company-month described by what was invoiced in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicedMonth {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub competency: Competency,
    pub invoiced: Amount,
    pub invoice_count: usize,
}

/// Revenue divergence already settled by an installment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendedFinding {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub plan_id: String,
    pub plan_number: Option<String>,
    pub divergence: Divergence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithheldVsGuide {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub competency: Competency,
    pub invoice_withheld: Amount,
    pub guide_withheld: Amount,
    pub shortfall: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossMunicipality {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub municipality: String,
    pub invoiced: Amount,
    pub invoice_count: usize,
    pub competencies: Vec<Competency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delinquency {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub tax_due: Amount,
    /// Matched transfers plus paid guides.
    pub paid: Amount,
    pub divergence: Divergence,
}

/// Original filing sent long after the due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateFiling {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub competency: Competency,
    pub declaration_id: String,
    pub due_date: NaiveDate,
    pub filed_on: NaiveDate,
    pub days_late: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SublimitBreach {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub year: i32,
    pub annual_revenue: Amount,
    pub divergence: Divergence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAuxFlag {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub competency: Competency,
    pub dasd_id: String,
    pub municipality_of_incidence: Option<String>,
    pub declared_revenue: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueInstallment {
    #[serde(flatten)]
    pub company: CompanyRef,
    pub plan_id: String,
    pub plan_number: Option<String>,
    pub seq: i64,
    pub due_date: NaiveDate,
    pub amount: Amount,
    pub paid_amount: Amount,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountBucket {
    pub label: String,
    pub count: usize,
    pub total: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginTotal {
    pub origin: String,
    pub count: usize,
    pub total: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub companies_analyzed: usize,
    pub competencies: usize,
    pub omissions: usize,
    pub zero_revenue_with_invoices: usize,
    pub no_movement: usize,
    pub revenue_divergences: usize,
    pub suspended_by_installment: usize,
    pub rate_divergences: usize,
    pub withholding_divergences: usize,
    pub withheld_vs_guides: usize,
    pub cross_municipality: usize,
    pub delinquency: usize,
    pub downward_amendments: usize,
    pub late_filings: usize,
    pub sublimit_breaches: usize,
    pub dasd_omissions: usize,
    pub dasd_municipality_mismatches: usize,
    pub special_regime_flags: usize,
    pub accounting_activity_flags: usize,
    pub overdue_installments: usize,
    pub transfer_count: usize,
    pub transfer_total: Amount,
    /// Sum of divergence values across every divergence-bearing section.
    pub total_divergent_value: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiYearReport {
    pub generated_at: NaiveDateTime,
    pub years_back: u32,
    pub first_competency: Competency,
    pub last_competency: Competency,
    pub omissions: Vec<InvoicedMonth>,
    pub zero_revenue_with_invoices: Vec<InvoicedMonth>,
    pub no_movement: Vec<InvoicedMonth>,
    pub revenue_divergences: Vec<CompanyFinding>,
    pub suspended_by_installment: Vec<SuspendedFinding>,
    pub rate_divergences: Vec<CompanyFinding>,
    pub withholding_divergences: Vec<CompanyFinding>,
    pub withheld_vs_guides: Vec<WithheldVsGuide>,
    pub cross_municipality: Vec<CrossMunicipality>,
    pub delinquency: Vec<Delinquency>,
    pub downward_amendments: Vec<CompanyFinding>,
    pub late_filings: Vec<LateFiling>,
    pub sublimit_breaches: Vec<SublimitBreach>,
    pub dasd_omissions: Vec<InvoicedMonth>,
    pub dasd_municipality_mismatches: Vec<AnnualAuxFlag>,
    pub special_regime_flags: Vec<AnnualAuxFlag>,
    pub accounting_activity_flags: Vec<AnnualAuxFlag>,
    pub overdue_installments: Vec<OverdueInstallment>,
    pub transfer_buckets: Vec<AmountBucket>,
    pub transfers_by_origin: Vec<OriginTotal>,
    pub summary: ReportSummary,
}

impl MultiYearReport {
    fn empty(generated_at: NaiveDateTime, years_back: u32, first: Competency, last: Competency) -> Self {
        Self {
            generated_at,
            years_back,
            first_competency: first,
            last_competency: last,
            omissions: Vec::new(),
            zero_revenue_with_invoices: Vec::new(),
            no_movement: Vec::new(),
            revenue_divergences: Vec::new(),
            suspended_by_installment: Vec::new(),
            rate_divergences: Vec::new(),
            withholding_divergences: Vec::new(),
            withheld_vs_guides: Vec::new(),
            cross_municipality: Vec::new(),
            delinquency: Vec::new(),
            downward_amendments: Vec::new(),
            late_filings: Vec::new(),
            sublimit_breaches: Vec::new(),
            dasd_omissions: Vec::new(),
            dasd_municipality_mismatches: Vec::new(),
            special_regime_flags: Vec::new(),
            accounting_activity_flags: Vec::new(),
            overdue_installments: Vec::new(),
            transfer_buckets: Vec::new(),
            transfers_by_origin: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    fn summarize(&self, companies_analyzed: usize, competencies: usize) -> ReportSummary {
        let findings = self
            .revenue_divergences
            .iter()
            .chain(&self.rate_divergences)
            .chain(&self.withholding_divergences)
            .chain(&self.downward_amendments)
            .map(|f| f.divergence.value);
        let total_divergent_value = findings
            .chain(self.delinquency.iter().map(|d| d.divergence.value))
            .chain(self.sublimit_breaches.iter().map(|s| s.divergence.value))
            .sum();
        ReportSummary {
            companies_analyzed,
            competencies,
            omissions: self.omissions.len(),
            zero_revenue_with_invoices: self.zero_revenue_with_invoices.len(),
            no_movement: self.no_movement.len(),
            revenue_divergences: self.revenue_divergences.len(),
            suspended_by_installment: self.suspended_by_installment.len(),
            rate_divergences: self.rate_divergences.len(),
            withholding_divergences: self.withholding_divergences.len(),
            withheld_vs_guides: self.withheld_vs_guides.len(),
            cross_municipality: self.cross_municipality.len(),
            delinquency: self.delinquency.len(),
            downward_amendments: self.downward_amendments.len(),
            late_filings: self.late_filings.len(),
            sublimit_breaches: self.sublimit_breaches.len(),
            dasd_omissions: self.dasd_omissions.len(),
            dasd_municipality_mismatches: self.dasd_municipality_mismatches.len(),
            special_regime_flags: self.special_regime_flags.len(),
            accounting_activity_flags: self.accounting_activity_flags.len(),
            overdue_installments: self.overdue_installments.len(),
            transfer_count: self.transfer_buckets.iter().map(|b| b.count).sum(),
            transfer_total: self.transfer_buckets.iter().map(|b| b.total).sum(),
            total_divergent_value,
        }
    }
}

/// Build the report over the `years_back` × 12 competencies ending at the
/// clock's current month.
pub fn build_multi_year_report(
    store: &FiscalStore,
    config: &CrossingConfig,
    clock: &CrossingClock,
    years_back: u32,
) -> CrossingResult<MultiYearReport> {
    if !(1..=MAX_YEARS_BACK).contains(&years_back) {
        return Err(CrossingError::InvalidYearSpan { years: years_back });
    }
    let competencies = clock.last_n_competencies(years_back as usize * 12);
    let (Some(&first), Some(&last)) = (competencies.first(), competencies.last()) else {
        return Err(CrossingError::InvalidYearSpan { years: years_back });
    };

    let snapshot = FiscalSnapshot::load(store, first, last)?;
    let index = ReportIndex::build(&snapshot, first, last, &config.withholding_tax_code);

    let mut report = MultiYearReport::empty(clock.now(), years_back, first, last);
    for company in &snapshot.companies {
        sections::scan_company_months(&mut report, &index, config, company, &competencies);
        sections::cross_municipality(&mut report, &index, config, company, &competencies);
        sections::sublimit_breaches(&mut report, &index, config, company, &competencies);
    }
    report.overdue_installments = sections::overdue_installments(&snapshot, clock.today());
    report.transfer_buckets = sections::transfer_buckets(&snapshot.transfers);
    report.transfers_by_origin = sections::transfers_by_origin(&snapshot.transfers);
    report.summary = report.summarize(snapshot.companies.len(), competencies.len());

    log::info!(
        "Report {first}..{last}: {} companies, {} omissions, {} revenue divergences, {} delinquent months",
        report.summary.companies_analyzed,
        report.summary.omissions,
        report.summary.revenue_divergences,
        report.summary.delinquency,
    );
    Ok(report)
}
