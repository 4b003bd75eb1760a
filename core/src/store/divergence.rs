use super::{DivergenceRow, FiscalStore};
use crate::{error::CrossingResult, event::EventLogEntry};
use rusqlite::params;

impl FiscalStore {
    /// Persist the outcome of one company+period crossing atomically:
    /// every divergence row, the company's cached risk level and the
    /// matching audit events either all land or none do.
    pub fn record_crossing_outcome(
        &self,
        company_id: &str,
        divergences: &[DivergenceRow],
        risk_level: &str,
        events: &[EventLogEntry],
    ) -> CrossingResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for d in divergences {
            tx.execute(
                "INSERT INTO divergence
                 (divergence_id, company_id, kind, severity, description,
                  value, competency, status, detected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    d.divergence_id,
                    d.company_id,
                    d.kind,
                    d.severity,
                    d.description,
                    d.value,
                    d.competency,
                    d.status,
                    d.detected_at,
                ],
            )?;
        }
        tx.execute(
            "UPDATE company SET risk_level = ?1 WHERE company_id = ?2",
            params![risk_level, company_id],
        )?;
        for e in events {
            Self::insert_event(&tx, e)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn divergences_for_company(&self, company_id: &str) -> CrossingResult<Vec<DivergenceRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT divergence_id, company_id, kind, severity, description,
                    value, competency, status, detected_at
             FROM divergence
             WHERE company_id = ?1
             ORDER BY detected_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok(DivergenceRow {
                    divergence_id: row.get(0)?,
                    company_id: row.get(1)?,
                    kind: row.get(2)?,
                    severity: row.get(3)?,
                    description: row.get(4)?,
                    value: row.get(5)?,
                    competency: row.get(6)?,
                    status: row.get(7)?,
                    detected_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn divergence_count(&self) -> CrossingResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM divergence", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Event log ──────────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> CrossingResult<()> {
        Self::insert_event(&self.conn, entry)?;
        Ok(())
    }

    pub fn events_for_company(&self, company_id: &str) -> CrossingResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, competency, event_type, payload, recorded_at
             FROM event_log WHERE company_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![company_id], Self::map_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn events_of_type(&self, event_type: &str) -> CrossingResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, competency, event_type, payload, recorded_at
             FROM event_log WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![event_type], Self::map_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_event(conn: &rusqlite::Connection, e: &EventLogEntry) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO event_log (company_id, competency, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![e.company_id, e.competency, e.event_type, e.payload, e.recorded_at],
        )
    }

    fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
        Ok(EventLogEntry {
            id: Some(row.get(0)?),
            company_id: row.get(1)?,
            competency: row.get(2)?,
            event_type: row.get(3)?,
            payload: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }
}
