//! Window snapshot and the (company, competency) lookups built from it.
//!
//! Every source is read once, up front, on one connection; each index is
//! then filled in a single pass so the report never does a nested scan
//! over invoices or transfers.

use crate::{
    error::CrossingResult,
    matching::digits_only,
    period::Competency,
    store::{
        AnnualAuxRow, CompanyRow, DeclarationRow, FiscalStore, InstallmentPlanRow, InvoiceRow,
        PaymentGuideRow, TransferRow,
    },
    types::{Amount, KIND_PGDAS},
};
use std::collections::HashMap;

pub type MonthKey<'a> = (&'a str, Competency);

/// Everything the report reads, loaded before any computation starts.
pub struct FiscalSnapshot {
    pub companies: Vec<CompanyRow>,
    /// All ordinary filings, oldest first (annual sums need whole years).
    pub declarations: Vec<DeclarationRow>,
    pub invoices: Vec<InvoiceRow>,
    pub transfers: Vec<TransferRow>,
    pub guides: Vec<PaymentGuideRow>,
    pub plans: Vec<InstallmentPlanRow>,
    pub annual_aux: Vec<AnnualAuxRow>,
}

impl FiscalSnapshot {
    pub fn load(store: &FiscalStore, first: Competency, last: Competency) -> CrossingResult<Self> {
        let start = first.first_day();
        let end = last.succ().first_day();
        Ok(Self {
            companies: store.list_companies()?,
            declarations: store.declarations_of_kind(KIND_PGDAS)?,
            invoices: store.invoices_between(start, end)?,
            transfers: store.transfers_between(start, end)?,
            guides: store.payment_guides_all()?,
            plans: store.installment_plans_all()?,
            annual_aux: store.annual_aux_all()?,
        })
    }
}

pub struct ReportIndex<'a> {
    first: Competency,
    last: Competency,
    /// Filings per month, oldest first.
    pub filings: HashMap<MonthKey<'a>, Vec<&'a DeclarationRow>>,
    /// Every filing per company regardless of window, oldest first.
    pub filings_by_company: HashMap<&'a str, Vec<&'a DeclarationRow>>,
    pub invoices: HashMap<MonthKey<'a>, Vec<&'a InvoiceRow>>,
    pub transfers_paid: HashMap<MonthKey<'a>, Amount>,
    pub guides_paid: HashMap<MonthKey<'a>, Amount>,
    pub guides_withheld: HashMap<MonthKey<'a>, Amount>,
    pub annual_aux: HashMap<MonthKey<'a>, Vec<&'a AnnualAuxRow>>,
    /// First in-force plan covering the month.
    pub plan_cover: HashMap<MonthKey<'a>, &'a InstallmentPlanRow>,
}

impl<'a> ReportIndex<'a> {
    pub fn build(
        snapshot: &'a FiscalSnapshot,
        first: Competency,
        last: Competency,
        withholding_tax_code: &str,
    ) -> Self {
        let mut index = Self {
            first,
            last,
            filings: HashMap::new(),
            filings_by_company: HashMap::new(),
            invoices: HashMap::new(),
            transfers_paid: HashMap::new(),
            guides_paid: HashMap::new(),
            guides_withheld: HashMap::new(),
            annual_aux: HashMap::new(),
            plan_cover: HashMap::new(),
        };

        for d in &snapshot.declarations {
            index.filings_by_company.entry(d.company_id.as_str()).or_default().push(d);
            if let Some(c) = d.competency().filter(|c| index.in_window(*c)) {
                index.filings.entry((d.company_id.as_str(), c)).or_default().push(d);
            }
        }

        for i in &snapshot.invoices {
            index
                .invoices
                .entry((i.company_id.as_str(), i.competency()))
                .or_default()
                .push(i);
        }

        // Company digits once; each transfer's digits once.
        let company_digits: Vec<(&str, String)> = snapshot
            .companies
            .iter()
            .map(|c| (c.company_id.as_str(), digits_only(&c.tax_id)))
            .filter(|(_, digits)| !digits.is_empty())
            .collect();
        for t in &snapshot.transfers {
            let fields: Vec<String> = [t.origin.as_deref(), t.description.as_deref()]
                .into_iter()
                .flatten()
                .map(digits_only)
                .collect();
            for (company_id, digits) in &company_digits {
                if fields.iter().any(|f| f.contains(digits.as_str())) {
                    *index.transfers_paid.entry((*company_id, t.competency())).or_default() += t.amount;
                }
            }
        }

        for g in snapshot.guides.iter().filter(|g| g.is_paid()) {
            let Some(c) = g.competency().filter(|c| index.in_window(*c)) else {
                continue;
            };
            let key = (g.company_id.as_str(), c);
            *index.guides_paid.entry(key).or_default() += g.total_amount;
            *index.guides_withheld.entry(key).or_default() += g.tax_amount(withholding_tax_code);
        }

        for a in &snapshot.annual_aux {
            if let Some(c) = a.competency().filter(|c| index.in_window(*c)) {
                index.annual_aux.entry((a.company_id.as_str(), c)).or_default().push(a);
            }
        }

        for p in snapshot.plans.iter().filter(|p| p.is_in_force()) {
            for c in p.covered_periods.iter().filter_map(|raw| Competency::parse(raw)) {
                if index.in_window(c) {
                    index.plan_cover.entry((p.company_id.as_str(), c)).or_insert(p);
                }
            }
        }

        index
    }

    pub fn in_window(&self, competency: Competency) -> bool {
        self.first <= competency && competency <= self.last
    }

    pub fn filings_of(&self, company_id: &'a str, competency: Competency) -> &[&'a DeclarationRow] {
        self.filings.get(&(company_id, competency)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn invoices_of(&self, company_id: &'a str, competency: Competency) -> &[&'a InvoiceRow] {
        self.invoices.get(&(company_id, competency)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn annual_aux_of(&self, company_id: &'a str, competency: Competency) -> &[&'a AnnualAuxRow] {
        self.annual_aux.get(&(company_id, competency)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Matched transfers plus paid guides.
    pub fn paid(&self, company_id: &'a str, competency: Competency) -> Amount {
        let key = (company_id, competency);
        self.transfers_paid.get(&key).copied().unwrap_or(0.0)
            + self.guides_paid.get(&key).copied().unwrap_or(0.0)
    }
}
