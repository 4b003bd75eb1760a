use super::{FiscalStore, GuideTaxRow, InstallmentPlanRow, InstallmentRow, PaymentGuideRow, TransferRow};
use crate::error::CrossingResult;
use chrono::NaiveDate;
use rusqlite::params;
use std::collections::HashMap;

impl FiscalStore {
    // ── Transfers ──────────────────────────────────────────────────

    pub fn insert_transfer(&self, t: &TransferRow) -> CrossingResult<()> {
        self.conn.execute(
            "INSERT INTO transfer (transfer_id, transfer_date, amount, origin, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![t.transfer_id, t.transfer_date, t.amount, t.origin, t.description],
        )?;
        Ok(())
    }

    /// Transfers dated in `[start, end)`. Matching them to a company is the
    /// caller's job (there is no company column).
    pub fn transfers_between(&self, start: NaiveDate, end: NaiveDate) -> CrossingResult<Vec<TransferRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT transfer_id, transfer_date, amount, origin, description
             FROM transfer
             WHERE transfer_date >= ?1 AND transfer_date < ?2
             ORDER BY transfer_date ASC, transfer_id ASC",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(TransferRow {
                    transfer_id: row.get(0)?,
                    transfer_date: row.get(1)?,
                    amount: row.get(2)?,
                    origin: row.get(3)?,
                    description: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Payment guides ─────────────────────────────────────────────

    pub fn insert_payment_guide(&self, g: &PaymentGuideRow) -> CrossingResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO payment_guide
             (guide_id, company_id, period, total_amount, principal_amount,
              interest_amount, penalty_amount, emitted_on, paid_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                g.guide_id,
                g.company_id,
                g.period,
                g.total_amount,
                g.principal_amount,
                g.interest_amount,
                g.penalty_amount,
                g.emitted_on,
                g.paid_on,
            ],
        )?;
        for tax in &g.taxes {
            tx.execute(
                "INSERT INTO guide_tax (guide_id, tax_code, amount) VALUES (?1, ?2, ?3)",
                params![g.guide_id, tax.tax_code, tax.amount],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Every guide with its tax breakdown.
    pub fn payment_guides_all(&self) -> CrossingResult<Vec<PaymentGuideRow>> {
        let mut taxes: HashMap<String, Vec<GuideTaxRow>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT guide_id, tax_code, amount FROM guide_tax ORDER BY rowid ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    GuideTaxRow {
                        tax_code: row.get(1)?,
                        amount: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (guide_id, tax) = row?;
                taxes.entry(guide_id).or_default().push(tax);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT guide_id, company_id, period, total_amount, principal_amount,
                    interest_amount, penalty_amount, emitted_on, paid_on
             FROM payment_guide
             ORDER BY company_id ASC, guide_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PaymentGuideRow {
                    guide_id: row.get(0)?,
                    company_id: row.get(1)?,
                    period: row.get(2)?,
                    total_amount: row.get(3)?,
                    principal_amount: row.get(4)?,
                    interest_amount: row.get(5)?,
                    penalty_amount: row.get(6)?,
                    emitted_on: row.get(7)?,
                    paid_on: row.get(8)?,
                    taxes: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|mut g| {
                g.taxes = taxes.remove(&g.guide_id).unwrap_or_default();
                g
            })
            .collect())
    }

    // ── Installment plans ──────────────────────────────────────────

    pub fn insert_installment_plan(&self, p: &InstallmentPlanRow) -> CrossingResult<()> {
        let covered = serde_json::to_string(&p.covered_periods)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO installment_plan
             (plan_id, company_id, plan_number, status, requested_on, covered_periods)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![p.plan_id, p.company_id, p.plan_number, p.status, p.requested_on, covered],
        )?;
        for i in &p.installments {
            tx.execute(
                "INSERT INTO installment (plan_id, seq, due_date, amount, paid_amount, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![p.plan_id, i.seq, i.due_date, i.amount, i.paid_amount, i.status],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Every plan with its installments in sequence order.
    pub fn installment_plans_all(&self) -> CrossingResult<Vec<InstallmentPlanRow>> {
        let mut installments: HashMap<String, Vec<InstallmentRow>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT plan_id, seq, due_date, amount, paid_amount, status
                 FROM installment ORDER BY plan_id ASC, seq ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    InstallmentRow {
                        seq: row.get(1)?,
                        due_date: row.get(2)?,
                        amount: row.get(3)?,
                        paid_amount: row.get(4)?,
                        status: row.get(5)?,
                    },
                ))
            })?;
            for row in rows {
                let (plan_id, installment) = row?;
                installments.entry(plan_id).or_default().push(installment);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT plan_id, company_id, plan_number, status, requested_on, covered_periods
             FROM installment_plan
             ORDER BY company_id ASC, plan_id ASC",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    InstallmentPlanRow {
                        plan_id: row.get(0)?,
                        company_id: row.get(1)?,
                        plan_number: row.get(2)?,
                        status: row.get(3)?,
                        requested_on: row.get(4)?,
                        covered_periods: Vec::new(),
                        installments: Vec::new(),
                    },
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut plans = Vec::with_capacity(raw.len());
        for (mut plan, covered) in raw {
            plan.covered_periods = serde_json::from_str(&covered).unwrap_or_else(|e| {
                log::warn!("plan {}: unreadable covered_periods ({e}), treating as empty", plan.plan_id);
                Vec::new()
            });
            plan.installments = installments.remove(&plan.plan_id).unwrap_or_default();
            plans.push(plan);
        }
        Ok(plans)
    }
}
