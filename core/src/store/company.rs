use super::{CompanyRow, FiscalStore};
use crate::error::CrossingResult;
use rusqlite::{params, OptionalExtension};

const COMPANY_COLUMNS: &str = "company_id, tax_id, legal_name, trade_name, tax_regime, status,
                               risk_level, withholding_exempt, activity_start";

impl FiscalStore {
    pub fn insert_company(&self, c: &CompanyRow) -> CrossingResult<()> {
        self.conn.execute(
            "INSERT INTO company
             (company_id, tax_id, legal_name, trade_name, tax_regime, status,
              risk_level, withholding_exempt, activity_start)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                c.company_id,
                c.tax_id,
                c.legal_name,
                c.trade_name,
                c.tax_regime,
                c.status,
                c.risk_level,
                c.withholding_exempt,
                c.activity_start,
            ],
        )?;
        Ok(())
    }

    pub fn get_company(&self, company_id: &str) -> CrossingResult<Option<CompanyRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COMPANY_COLUMNS} FROM company WHERE company_id = ?1"),
                params![company_id],
                Self::map_company_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_companies(&self) -> CrossingResult<Vec<CompanyRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM company ORDER BY company_id ASC"
        ))?;
        let rows = stmt
            .query_map([], Self::map_company_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Companies in the given status and tax regime, in id order.
    pub fn list_companies_by_status_regime(
        &self,
        status: &str,
        regime: &str,
    ) -> CrossingResult<Vec<CompanyRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM company
             WHERE status = ?1 AND tax_regime = ?2
             ORDER BY company_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![status, regime], Self::map_company_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_company_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompanyRow> {
        Ok(CompanyRow {
            company_id: row.get(0)?,
            tax_id: row.get(1)?,
            legal_name: row.get(2)?,
            trade_name: row.get(3)?,
            tax_regime: row.get(4)?,
            status: row.get(5)?,
            risk_level: row.get(6)?,
            withholding_exempt: row.get(7)?,
            activity_start: row.get(8)?,
        })
    }
}
