//! SQLite persistence layer — the Complaint Store adapter.
//!
//! RULE: Only the store talks to the database.
//! The engine calls store methods — it never executes SQL directly.

use crate::{
    error::EngineResult,
    event::EventLogEntry,
    types::{from_millis, to_millis},
};
use rusqlite::{params, Connection};
use std::time::Duration;

mod complaint;
mod contractor;
mod geo;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CivicStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
    busy_timeout: Duration,
}

impl CivicStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open (or create) a database file. Concurrent writers wait up to
    /// `busy_timeout` for the lock before the call fails.
    pub fn open_with_timeout(path: &str, busy_timeout: Duration) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            busy_timeout,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> EngineResult<Self> {
        match &self.path {
            Some(p) => Self::open_with_timeout(p, self.busy_timeout),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_geography.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_officers_contractors.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_complaints.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_event_log.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (complaint_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.complaint_id,
                entry.event_type,
                entry.payload,
                to_millis(entry.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_complaint(&self, complaint_id: &str) -> EngineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, complaint_id, event_type, payload, created_at
             FROM event_log WHERE complaint_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![complaint_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    complaint_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: from_millis(row.get(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
