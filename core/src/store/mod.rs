//! SQLite persistence layer.
//!
//! RULE: Only the store modules talk to the database.
//! The engine calls store methods — it never executes SQL directly.

mod dispute;
mod reconcile;
mod timeline;

use crate::error::DisputeResult;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

pub struct DisputeStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl DisputeStore {
    pub fn open(path: &str) -> DisputeResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DisputeResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new isolated database.
    pub fn reopen(&self) -> DisputeResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DisputeResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_disputes.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_reconciliation.sql"))?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Timestamps are stored as RFC 3339 text with fixed precision so that
/// lexicographic order equals chronological order.
pub(crate) fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_sql(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}
