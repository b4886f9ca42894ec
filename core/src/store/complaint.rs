use super::CivicStore;
use crate::{
    complaint::{Complaint, GeoPoint, ParseEnumError, PhotoStage},
    error::{EngineError, EngineResult},
    lifecycle::StatusChange,
    types::{from_millis, to_millis, Timestamp},
};
use rusqlite::{params, OptionalExtension};
use std::{str::FromStr, time::Duration};

const COMPLAINT_COLUMNS: &str = "complaint_id, ref_seq, category, description, state_id, city_id,
    nagar_id, address, latitude, longitude, citizen_name, citizen_phone, status, photo_url,
    before_photo_url, after_photo_url, assigned_contractor_id, created_at, assigned_at,
    resolved_at, updated_at";

fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// Helper function for mapping complaint rows
fn complaint_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Complaint> {
    let latitude: Option<f64> = row.get(8)?;
    let longitude: Option<f64> = row.get(9)?;
    Ok(Complaint {
        complaint_id: row.get(0)?,
        ref_seq: row.get(1)?,
        category: parse_column(row, 2)?,
        description: row.get(3)?,
        state_id: row.get(4)?,
        city_id: row.get(5)?,
        nagar_id: row.get(6)?,
        address: row.get(7)?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoPoint { latitude, longitude }),
        citizen_name: row.get(10)?,
        citizen_phone: row.get(11)?,
        status: parse_column(row, 12)?,
        photo_url: row.get(13)?,
        before_photo_url: row.get(14)?,
        after_photo_url: row.get(15)?,
        assigned_contractor_id: row.get(16)?,
        created_at: from_millis(row.get(17)?),
        assigned_at: row.get::<_, Option<i64>>(18)?.map(from_millis),
        resolved_at: row.get::<_, Option<i64>>(19)?.map(from_millis),
        updated_at: from_millis(row.get(20)?),
    })
}

impl CivicStore {
    // ── Complaint ──────────────────────────────────────────────────

    /// Insert a new complaint and return its sequential reference number.
    /// `c.ref_seq` is ignored; the next number is taken inside the INSERT.
    pub fn insert_complaint(&self, c: &Complaint) -> EngineResult<i64> {
        self.conn.execute(
            "INSERT INTO complaint (
                complaint_id, ref_seq, category, description, state_id, city_id, nagar_id,
                address, latitude, longitude, citizen_name, citizen_phone, status, photo_url,
                before_photo_url, after_photo_url, assigned_contractor_id, created_at,
                assigned_at, resolved_at, updated_at
             ) VALUES (
                ?1, (SELECT COALESCE(MAX(ref_seq), 0) + 1 FROM complaint), ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
             )",
            params![
                c.complaint_id,
                c.category.as_str(),
                c.description,
                c.state_id,
                c.city_id,
                c.nagar_id,
                c.address,
                c.location.map(|p| p.latitude),
                c.location.map(|p| p.longitude),
                c.citizen_name,
                c.citizen_phone,
                c.status.as_str(),
                c.photo_url,
                c.before_photo_url,
                c.after_photo_url,
                c.assigned_contractor_id,
                to_millis(c.created_at),
                c.assigned_at.map(to_millis),
                c.resolved_at.map(to_millis),
                to_millis(c.updated_at),
            ],
        )?;
        self.conn
            .query_row(
                "SELECT ref_seq FROM complaint WHERE complaint_id = ?1",
                params![c.complaint_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn get_complaint(&self, complaint_id: &str) -> EngineResult<Option<Complaint>> {
        self.conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE complaint_id = ?1"),
                params![complaint_id],
                complaint_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Compare-and-swap status change.
    ///
    /// One UPDATE, guarded by the observed status, by `resolved_at` still
    /// being NULL, and (for assignment) by the contractor still existing.
    /// Returns false when any guard failed; the caller re-reads to find out
    /// which.
    pub fn apply_status_change(
        &self,
        complaint_id: &str,
        change: &StatusChange,
        now: Timestamp,
    ) -> EngineResult<bool> {
        let n = self.conn.execute(
            "UPDATE complaint SET
                status = ?3,
                updated_at = ?4,
                assigned_contractor_id = COALESCE(?5, assigned_contractor_id),
                assigned_at = CASE
                    WHEN ?5 IS NOT NULL AND assigned_at IS NULL THEN ?4
                    ELSE assigned_at END,
                resolved_at = CASE WHEN ?3 = 'resolved' THEN ?4 ELSE resolved_at END
             WHERE complaint_id = ?1
               AND status = ?2
               AND resolved_at IS NULL
               AND (?5 IS NULL OR EXISTS (
                    SELECT 1 FROM contractor WHERE contractor_id = ?5))",
            params![
                complaint_id,
                change.from.as_str(),
                change.to.as_str(),
                to_millis(now),
                change.contractor_id,
            ],
        )?;
        Ok(n == 1)
    }

    /// `apply_status_change`, waiting at most `wait` for the write lock.
    /// `Ok(None)` means another writer held the lock the whole time and
    /// nothing was changed.
    pub fn apply_status_change_within(
        &self,
        complaint_id: &str,
        change: &StatusChange,
        now: Timestamp,
        wait: Duration,
    ) -> EngineResult<Option<bool>> {
        self.conn.busy_timeout(wait)?;
        let result = self.apply_status_change(complaint_id, change, now);
        self.conn.busy_timeout(self.busy_timeout)?;
        match result {
            Ok(applied) => Ok(Some(applied)),
            Err(EngineError::StoreUnavailable(e))
                if e.sqlite_error_code() == Some(rusqlite::ErrorCode::DatabaseBusy) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Record a before/after work photo. Returns false if the complaint is unknown.
    pub fn set_complaint_photo(
        &self,
        complaint_id: &str,
        stage: PhotoStage,
        url: &str,
        now: Timestamp,
    ) -> EngineResult<bool> {
        let sql = match stage {
            PhotoStage::Before => {
                "UPDATE complaint SET before_photo_url = ?1, updated_at = ?2 WHERE complaint_id = ?3"
            }
            PhotoStage::After => {
                "UPDATE complaint SET after_photo_url = ?1, updated_at = ?2 WHERE complaint_id = ?3"
            }
        };
        let n = self
            .conn
            .execute(sql, params![url, to_millis(now), complaint_id])?;
        Ok(n == 1)
    }

    pub fn all_complaints(&self) -> EngineResult<Vec<Complaint>> {
        self.query_complaints("1 = 1", params![])
    }

    pub fn complaints_in_city(&self, city_id: &str) -> EngineResult<Vec<Complaint>> {
        self.query_complaints("city_id = ?1", params![city_id])
    }

    /// "My complaints". Phone is a weak key: several citizens may share one.
    pub fn complaints_by_phone(&self, phone: &str) -> EngineResult<Vec<Complaint>> {
        self.query_complaints("citizen_phone = ?1", params![phone])
    }

    pub fn complaints_for_contractor(&self, contractor_id: &str) -> EngineResult<Vec<Complaint>> {
        self.query_complaints("assigned_contractor_id = ?1", params![contractor_id])
    }

    pub fn complaint_count(&self) -> EngineResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM complaint", [], |row| row.get(0))
            .map_err(Into::into)
    }

    fn query_complaints(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> EngineResult<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE {filter}
             ORDER BY created_at DESC, ref_seq DESC"
        ))?;
        let rows = stmt.query_map(args, complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
