use super::{AnnualAuxRow, DeclarationRow, FiscalStore};
use crate::error::CrossingResult;
use rusqlite::params;

const DECLARATION_COLUMNS: &str = "declaration_id, company_id, period, kind, declared_revenue,
                                   tax_due, receipt_code, auth_code, raw_payload, created_at";

impl FiscalStore {
    // ── Self-assessments ───────────────────────────────────────────

    pub fn insert_declaration(&self, d: &DeclarationRow) -> CrossingResult<()> {
        self.conn.execute(
            "INSERT INTO declaration
             (declaration_id, company_id, period, kind, declared_revenue,
              tax_due, receipt_code, auth_code, raw_payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                d.declaration_id,
                d.company_id,
                d.period,
                d.kind,
                d.declared_revenue,
                d.tax_due,
                d.receipt_code,
                d.auth_code,
                d.raw_payload,
                d.created_at,
            ],
        )?;
        Ok(())
    }

    /// All filings of `kind` for one company, oldest first.
    /// Periods are raw; callers filter by competency.
    pub fn declarations_for_company(
        &self,
        company_id: &str,
        kind: &str,
    ) -> CrossingResult<Vec<DeclarationRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DECLARATION_COLUMNS} FROM declaration
             WHERE company_id = ?1 AND kind = ?2
             ORDER BY created_at ASC, declaration_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![company_id, kind], Self::map_declaration_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every filing of `kind`, grouped by company and oldest first.
    pub fn declarations_of_kind(&self, kind: &str) -> CrossingResult<Vec<DeclarationRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DECLARATION_COLUMNS} FROM declaration
             WHERE kind = ?1
             ORDER BY company_id ASC, created_at ASC, declaration_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![kind], Self::map_declaration_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_declaration_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeclarationRow> {
        Ok(DeclarationRow {
            declaration_id: row.get(0)?,
            company_id: row.get(1)?,
            period: row.get(2)?,
            kind: row.get(3)?,
            declared_revenue: row.get(4)?,
            tax_due: row.get(5)?,
            receipt_code: row.get(6)?,
            auth_code: row.get(7)?,
            raw_payload: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    // ── DAS-D ──────────────────────────────────────────────────────

    pub fn insert_annual_aux(&self, a: &AnnualAuxRow) -> CrossingResult<()> {
        self.conn.execute(
            "INSERT INTO annual_declaration_aux
             (dasd_id, company_id, period, municipality_of_incidence, special_regime,
              accounting_activity, declared_revenue, cash_basis_revenue, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                a.dasd_id,
                a.company_id,
                a.period,
                a.municipality_of_incidence,
                a.special_regime,
                a.accounting_activity,
                a.declared_revenue,
                a.cash_basis_revenue,
                a.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn annual_aux_all(&self) -> CrossingResult<Vec<AnnualAuxRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT dasd_id, company_id, period, municipality_of_incidence, special_regime,
                    accounting_activity, declared_revenue, cash_basis_revenue, created_at
             FROM annual_declaration_aux
             ORDER BY company_id ASC, created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AnnualAuxRow {
                    dasd_id: row.get(0)?,
                    company_id: row.get(1)?,
                    period: row.get(2)?,
                    municipality_of_incidence: row.get(3)?,
                    special_regime: row.get(4)?,
                    accounting_activity: row.get(5)?,
                    declared_revenue: row.get(6)?,
                    cash_basis_revenue: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
