use super::{FiscalStore, SettingsRow};
use crate::error::CrossingResult;
use rusqlite::{params, OptionalExtension};

impl FiscalStore {
    /// There is at most one settings record.
    pub fn upsert_settings(&self, s: &SettingsRow) -> CrossingResult<()> {
        self.conn.execute(
            "INSERT INTO settings (id, municipality_name, state_sublimit, municipal_sublimit)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET
                municipality_name  = excluded.municipality_name,
                state_sublimit     = excluded.state_sublimit,
                municipal_sublimit = excluded.municipal_sublimit",
            params![s.municipality_name, s.state_sublimit, s.municipal_sublimit],
        )?;
        Ok(())
    }

    pub fn get_settings(&self) -> CrossingResult<Option<SettingsRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT municipality_name, state_sublimit, municipal_sublimit
                 FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(SettingsRow {
                        municipality_name: row.get(0)?,
                        state_sublimit: row.get(1)?,
                        municipal_sublimit: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
