use super::{FiscalStore, InvoiceRow};
use crate::error::CrossingResult;
use chrono::NaiveDate;
use rusqlite::params;

const INVOICE_COLUMNS: &str = "invoice_id, company_id, number, value, issue_date, service_code,
                               tax_withheld, withheld_amount, rate, service_municipality,
                               payer_tax_id, raw_payload";

impl FiscalStore {
    pub fn insert_invoice(&self, i: &InvoiceRow) -> CrossingResult<()> {
        self.conn.execute(
            "INSERT INTO invoice
             (invoice_id, company_id, number, value, issue_date, service_code,
              tax_withheld, withheld_amount, rate, service_municipality,
              payer_tax_id, raw_payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                i.invoice_id,
                i.company_id,
                i.number,
                i.value,
                i.issue_date,
                i.service_code,
                i.tax_withheld,
                i.withheld_amount,
                i.rate,
                i.service_municipality,
                i.payer_tax_id,
                i.raw_payload,
            ],
        )?;
        Ok(())
    }

    /// Invoices issued by one company in the half-open window `[start, end)`.
    pub fn invoices_for_company_between(
        &self,
        company_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CrossingResult<Vec<InvoiceRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice
             WHERE company_id = ?1 AND issue_date >= ?2 AND issue_date < ?3
             ORDER BY issue_date ASC, invoice_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![company_id, start, end], Self::map_invoice_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every invoice issued in `[start, end)`.
    pub fn invoices_between(&self, start: NaiveDate, end: NaiveDate) -> CrossingResult<Vec<InvoiceRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice
             WHERE issue_date >= ?1 AND issue_date < ?2
             ORDER BY company_id ASC, issue_date ASC, invoice_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![start, end], Self::map_invoice_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_invoice_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InvoiceRow> {
        Ok(InvoiceRow {
            invoice_id: row.get(0)?,
            company_id: row.get(1)?,
            number: row.get(2)?,
            value: row.get(3)?,
            issue_date: row.get(4)?,
            service_code: row.get(5)?,
            tax_withheld: row.get(6)?,
            withheld_amount: row.get(7)?,
            rate: row.get(8)?,
            service_municipality: row.get(9)?,
            payer_tax_id: row.get(10)?,
            raw_payload: row.get(11)?,
        })
    }
}
