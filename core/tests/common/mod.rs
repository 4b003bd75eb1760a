//! Shared fixtures: an engine over a migrated in-memory store with the
//! clock frozen on 2025-11-15, and row builders with sensible defaults.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use fiscal_crossing_core::{
    engine::CrossingEngine,
    store::{
        AnnualAuxRow, CompanyRow, DeclarationRow, GuideTaxRow, InstallmentPlanRow, InstallmentRow,
        InvoiceRow, PaymentGuideRow, TransferRow,
    },
    types::KIND_PGDAS,
};

pub fn today() -> NaiveDate {
    date(2025, 11, 15)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32, hour: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(hour, 0, 0).expect("valid time")
}

pub fn engine() -> CrossingEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    CrossingEngine::build_test(today()).expect("build_test failed")
}

pub fn company(id: &str, tax_id: &str) -> CompanyRow {
    CompanyRow {
        company_id: id.into(),
        tax_id: tax_id.into(),
        legal_name: format!("{id} Servicos Ltda"),
        trade_name: None,
        tax_regime: "SIMPLES_NACIONAL".into(),
        status: "ATIVA".into(),
        risk_level: None,
        withholding_exempt: false,
        activity_start: None,
    }
}

pub fn add_company(engine: &CrossingEngine, id: &str, tax_id: &str) -> CompanyRow {
    let row = company(id, tax_id);
    engine.store.insert_company(&row).expect("insert company");
    row
}

/// Ordinary filing; `created_at` decides which filing is authoritative.
pub fn declaration(
    id: &str,
    company_id: &str,
    period: &str,
    revenue: f64,
    tax_due: f64,
    created_at: NaiveDateTime,
) -> DeclarationRow {
    DeclarationRow {
        declaration_id: id.into(),
        company_id: company_id.into(),
        period: period.into(),
        kind: KIND_PGDAS.into(),
        declared_revenue: revenue,
        tax_due,
        receipt_code: None,
        auth_code: None,
        raw_payload: None,
        created_at,
    }
}

pub fn add_declaration(
    engine: &CrossingEngine,
    id: &str,
    company_id: &str,
    period: &str,
    revenue: f64,
    tax_due: f64,
    created_at: NaiveDateTime,
) {
    engine
        .store
        .insert_declaration(&declaration(id, company_id, period, revenue, tax_due, created_at))
        .expect("insert declaration");
}

pub fn invoice(id: &str, company_id: &str, value: f64, issue_date: NaiveDate) -> InvoiceRow {
    InvoiceRow {
        invoice_id: id.into(),
        company_id: company_id.into(),
        number: Some(id.to_uppercase()),
        value,
        issue_date,
        service_code: Some("1.07".into()),
        tax_withheld: false,
        withheld_amount: None,
        rate: None,
        service_municipality: None,
        payer_tax_id: None,
        raw_payload: None,
    }
}

pub fn add_invoice(engine: &CrossingEngine, row: InvoiceRow) {
    engine.store.insert_invoice(&row).expect("insert invoice");
}

pub fn add_transfer(engine: &CrossingEngine, id: &str, day: NaiveDate, amount: f64, description: &str) {
    engine
        .store
        .insert_transfer(&TransferRow {
            transfer_id: id.into(),
            transfer_date: day,
            amount,
            origin: Some("BANCO DO BRASIL".into()),
            description: Some(description.into()),
        })
        .expect("insert transfer");
}

pub fn paid_guide(id: &str, company_id: &str, period: &str, total: f64, withheld: f64) -> PaymentGuideRow {
    PaymentGuideRow {
        guide_id: id.into(),
        company_id: company_id.into(),
        period: period.into(),
        total_amount: total,
        principal_amount: total,
        interest_amount: 0.0,
        penalty_amount: 0.0,
        emitted_on: None,
        paid_on: Some(today()),
        taxes: vec![GuideTaxRow {
            tax_code: "ISS_RETIDO".into(),
            amount: withheld,
        }],
    }
}

pub fn installment_plan(
    id: &str,
    company_id: &str,
    status: &str,
    covered: &[&str],
    installments: Vec<InstallmentRow>,
) -> InstallmentPlanRow {
    InstallmentPlanRow {
        plan_id: id.into(),
        company_id: company_id.into(),
        plan_number: Some(format!("PARC-{id}")),
        status: status.into(),
        requested_on: Some(date(2025, 1, 10)),
        covered_periods: covered.iter().map(|p| p.to_string()).collect(),
        installments,
    }
}

pub fn annual_aux(id: &str, company_id: &str, period: &str, municipality: Option<&str>) -> AnnualAuxRow {
    AnnualAuxRow {
        dasd_id: id.into(),
        company_id: company_id.into(),
        period: period.into(),
        municipality_of_incidence: municipality.map(str::to_string),
        special_regime: false,
        accounting_activity: false,
        declared_revenue: 0.0,
        cash_basis_revenue: None,
        created_at: at(2025, 3, 1, 9),
    }
}
