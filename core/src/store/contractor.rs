use super::CivicStore;
use crate::{
    complaint::ComplaintStatus,
    contractor::{Contractor, Officer},
    error::EngineResult,
    types::{from_millis, to_millis, Timestamp},
};
use rusqlite::{params, OptionalExtension};

const CONTRACTOR_COLUMNS: &str =
    "contractor_id, name, phone, email, nagar_id, created_at";

fn contractor_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contractor> {
    Ok(Contractor {
        contractor_id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        nagar_id: row.get(4)?,
        created_at: from_millis(row.get(5)?),
    })
}

impl CivicStore {
    // ── Contractor ─────────────────────────────────────────────────

    pub fn insert_contractor(&self, c: &Contractor) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO contractor (contractor_id, name, phone, email, nagar_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                c.contractor_id,
                c.name,
                c.phone,
                c.email,
                c.nagar_id,
                to_millis(c.created_at),
            ],
        )?;
        Ok(())
    }

    /// Returns false when the contractor no longer exists.
    pub fn update_contractor(&self, c: &Contractor) -> EngineResult<bool> {
        let n = self.conn.execute(
            "UPDATE contractor SET name = ?1, phone = ?2, email = ?3, nagar_id = ?4
             WHERE contractor_id = ?5",
            params![c.name, c.phone, c.email, c.nagar_id, c.contractor_id],
        )?;
        Ok(n == 1)
    }

    /// Complaints already assigned keep their (now dangling) reference.
    pub fn delete_contractor(&self, contractor_id: &str) -> EngineResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM contractor WHERE contractor_id = ?1",
            params![contractor_id],
        )?;
        Ok(n == 1)
    }

    pub fn get_contractor(&self, contractor_id: &str) -> EngineResult<Option<Contractor>> {
        self.conn
            .query_row(
                &format!("SELECT {CONTRACTOR_COLUMNS} FROM contractor WHERE contractor_id = ?1"),
                params![contractor_id],
                contractor_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All contractors registered in a nagar, in registration order.
    pub fn contractors_in_nagar(&self, nagar_id: &str) -> EngineResult<Vec<Contractor>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTRACTOR_COLUMNS} FROM contractor WHERE nagar_id = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![nagar_id], contractor_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Most recent assigned_at across every complaint the contractor holds.
    pub fn contractor_last_assigned_at(&self, contractor_id: &str) -> EngineResult<Option<Timestamp>> {
        let ms: Option<i64> = self.conn.query_row(
            "SELECT MAX(assigned_at) FROM complaint WHERE assigned_contractor_id = ?1",
            params![contractor_id],
            |row| row.get(0),
        )?;
        Ok(ms.map(from_millis))
    }

    /// Complaints currently assigned or in progress for this contractor.
    pub fn contractor_open_load(&self, contractor_id: &str) -> EngineResult<i64> {
        let open = ComplaintStatus::ALL
            .iter()
            .filter(|s| s.is_open_work())
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM complaint
                     WHERE assigned_contractor_id = ?1 AND status IN ({open})"
                ),
                params![contractor_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Officer ────────────────────────────────────────────────────

    pub fn insert_officer(&self, o: &Officer) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO officer (officer_id, name, city_id) VALUES (?1, ?2, ?3)",
            params![o.officer_id, o.name, o.city_id],
        )?;
        Ok(())
    }

    pub fn get_officer(&self, officer_id: &str) -> EngineResult<Option<Officer>> {
        self.conn
            .query_row(
                "SELECT officer_id, name, city_id FROM officer WHERE officer_id = ?1",
                params![officer_id],
                |row| {
                    Ok(Officer {
                        officer_id: row.get(0)?,
                        name: row.get(1)?,
                        city_id: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}
