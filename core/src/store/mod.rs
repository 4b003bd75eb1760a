//! SQLite persistence layer for fiscal records and crossing outputs.
//!
//! RULE: Only the store talks to the database.
//! Checks and orchestrators call store methods — they never execute SQL.
//!
//! Periods are stored exactly as the source system delivered them; the
//! engine canonicalizes them. Row types are plain snapshots.

use crate::{
    error::CrossingResult,
    matching::any_field_matches,
    period::Competency,
    types::{Amount, CompanyId},
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

mod company;
mod divergence;
mod filing;
mod invoice;
mod payment;
mod settings;

pub struct FiscalStore {
    conn: Connection,
}

impl FiscalStore {
    pub fn open(path: &str) -> CrossingResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CrossingResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CrossingResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_fiscal_records.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_crossing_results.sql"))?;
        Ok(())
    }
}

// ── Row types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRow {
    pub company_id: CompanyId,
    pub tax_id: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub tax_regime: String,
    pub status: String,
    /// Cached classification; written only by the composite crossing.
    pub risk_level: Option<String>,
    pub withholding_exempt: bool,
    pub activity_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsRow {
    pub municipality_name: Option<String>,
    pub state_sublimit: Option<Amount>,
    pub municipal_sublimit: Option<Amount>,
}

/// One self-assessment filing (ordinary "PGDAS" or annual "DEFIS").
/// Several rows may exist per company+period; creation order decides
/// which one is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationRow {
    pub declaration_id: String,
    pub company_id: CompanyId,
    pub period: String,
    pub kind: String,
    pub declared_revenue: Amount,
    pub tax_due: Amount,
    pub receipt_code: Option<String>,
    pub auth_code: Option<String>,
    pub raw_payload: Option<String>,
    pub created_at: NaiveDateTime,
}

impl DeclarationRow {
    pub fn competency(&self) -> Option<Competency> {
        Competency::parse(&self.period)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub invoice_id: String,
    pub company_id: CompanyId,
    pub number: Option<String>,
    pub value: Amount,
    pub issue_date: NaiveDate,
    pub service_code: Option<String>,
    pub tax_withheld: bool,
    pub withheld_amount: Option<Amount>,
    pub rate: Option<f64>,
    pub service_municipality: Option<String>,
    pub payer_tax_id: Option<String>,
    pub raw_payload: Option<String>,
}

impl InvoiceRow {
    pub fn competency(&self) -> Competency {
        Competency::of_date(self.issue_date)
    }
}

/// A bank-relayed payment. The paying company is only identifiable
/// through digits embedded in `origin` / `description`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRow {
    pub transfer_id: String,
    pub transfer_date: NaiveDate,
    pub amount: Amount,
    pub origin: Option<String>,
    pub description: Option<String>,
}

impl TransferRow {
    /// Best-effort: see `matching` for the known false-positive cases.
    pub fn mentions(&self, tax_id: &str) -> bool {
        any_field_matches(&[self.origin.as_deref(), self.description.as_deref()], tax_id)
    }

    pub fn competency(&self) -> Competency {
        Competency::of_date(self.transfer_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideTaxRow {
    pub tax_code: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentGuideRow {
    pub guide_id: String,
    pub company_id: CompanyId,
    pub period: String,
    pub total_amount: Amount,
    pub principal_amount: Amount,
    pub interest_amount: Amount,
    pub penalty_amount: Amount,
    pub emitted_on: Option<NaiveDate>,
    pub paid_on: Option<NaiveDate>,
    pub taxes: Vec<GuideTaxRow>,
}

impl PaymentGuideRow {
    pub fn competency(&self) -> Option<Competency> {
        Competency::parse(&self.period)
    }

    pub fn is_paid(&self) -> bool {
        self.paid_on.is_some()
    }

    pub fn tax_amount(&self, tax_code: &str) -> Amount {
        self.taxes
            .iter()
            .filter(|t| t.tax_code == tax_code)
            .map(|t| t.amount)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRow {
    pub seq: i64,
    pub due_date: NaiveDate,
    pub amount: Amount,
    pub paid_amount: Amount,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPlanRow {
    pub plan_id: String,
    pub company_id: CompanyId,
    pub plan_number: Option<String>,
    pub status: String,
    pub requested_on: Option<NaiveDate>,
    /// Raw periods the plan settles.
    pub covered_periods: Vec<String>,
    pub installments: Vec<InstallmentRow>,
}

/// Plan statuses that no longer cover anything.
pub const INACTIVE_PLAN_STATUSES: [&str; 3] = ["CANCELADO", "RESCINDIDO", "INDEFERIDO"];

impl InstallmentPlanRow {
    pub fn is_in_force(&self) -> bool {
        !INACTIVE_PLAN_STATUSES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(self.status.trim()))
    }
}

/// Supplementary per-competency filing ("DAS-D").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAuxRow {
    pub dasd_id: String,
    pub company_id: CompanyId,
    pub period: String,
    pub municipality_of_incidence: Option<String>,
    pub special_regime: bool,
    pub accounting_activity: bool,
    pub declared_revenue: Amount,
    pub cash_basis_revenue: Option<Amount>,
    pub created_at: NaiveDateTime,
}

impl AnnualAuxRow {
    pub fn competency(&self) -> Option<Competency> {
        Competency::parse(&self.period)
    }
}

pub const DIVERGENCE_STATUS_PENDING: &str = "PENDENTE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceRow {
    pub divergence_id: String,
    pub company_id: CompanyId,
    pub kind: String,
    pub severity: String,
    pub description: String,
    pub value: Amount,
    pub competency: Option<String>,
    pub status: String,
    pub detected_at: NaiveDateTime,
}

impl DivergenceRow {
    /// A freshly detected, pending divergence.
    pub fn pending(
        company_id: &str,
        divergence: &crate::divergence::Divergence,
        detected_at: NaiveDateTime,
    ) -> Self {
        Self {
            divergence_id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            kind: divergence.kind.as_str().to_string(),
            severity: divergence.severity.as_str().to_string(),
            description: divergence.description.clone(),
            value: divergence.value,
            competency: divergence.competency.map(|c| c.to_string()),
            status: DIVERGENCE_STATUS_PENDING.to_string(),
            detected_at,
        }
    }
}
