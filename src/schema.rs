//! # SQLite Schema for the Log Store
//!
//! This module opens the store, applies the journal mode and makes sure the
//! `Logs` table and its indexes exist. It runs once, synchronously, while the
//! sink is being constructed and before any background worker starts; any
//! failure here is fatal to construction.
//!
//! ## Table Overview
//!
//! ```text
//! Logs
//! ┌──────────────────┬────────────────────────────────────────────┐
//! │ Id (PK)          │ store-assigned, increases in commit order  │
//! │ Timestamp        │ UTC text, fixed width     ◄── IX_Logs_Timestamp
//! │ SourceContext    │ promoted                                   │
//! │ Level            │ level name                                 │
//! │ Message          │ rendered text                              │
//! │ MessageTemplate  │ template, if tracked                       │
//! │ RequestId        │ promoted                  ◄── IX_Logs_RequestId
//! │ TraceId          │ promoted                                   │
//! │ SpanId           │ promoted                                   │
//! │ Properties       │ compact JSON object or NULL                │
//! │ Exception        │ error trace or NULL                        │
//! └──────────────────┴────────────────────────────────────────────┘
//! ```
//!
//! The timestamp index serves range scans and the retention delete; the
//! request index serves per-request lookups.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Deserializer};

use crate::{Error, Result, SELFLOG_TARGET};

// =============================================================================
// DDL Statements
// =============================================================================

/// The `Logs` table. One row per accepted record.
///
/// `Id INTEGER PRIMARY KEY` aliases the rowid, so ids are assigned by the
/// store and increase with every insert.
const CREATE_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS Logs (
    Id              INTEGER PRIMARY KEY,
    Timestamp       TEXT NOT NULL,
    SourceContext   TEXT,
    Level           TEXT NOT NULL,
    Message         TEXT,
    MessageTemplate TEXT,
    RequestId       TEXT,
    TraceId         TEXT,
    SpanId          TEXT,
    Properties      TEXT,
    Exception       TEXT
)
"#;

/// Range scans and the retention delete.
const CREATE_TIMESTAMP_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS IX_Logs_Timestamp ON Logs(Timestamp)
"#;

/// Per-request lookups.
const CREATE_REQUEST_ID_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS IX_Logs_RequestId ON Logs(RequestId)
"#;

/// The insert bound by the batch writer, in [`ShapedRow`](crate::codec::ShapedRow) order.
pub const INSERT_LOG: &str = "INSERT INTO Logs \
     (Timestamp, Level, Message, MessageTemplate, Properties, SourceContext, RequestId, TraceId, SpanId, Exception) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

/// The retention delete. `?1` is the formatted cutoff.
pub const DELETE_OLDER_THAN: &str = "DELETE FROM Logs WHERE Timestamp < ?1";

// =============================================================================
// Journal Mode
// =============================================================================

/// SQLite journal mode, applied with `PRAGMA journal_mode`.
///
/// `Wal` (the default) favors write throughput: commits append to a separate
/// `-wal` file that is checkpointed into the main file later. The rollback
/// journal modes keep everything in one file between transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    #[default]
    Wal,
    Off,
}

impl JournalMode {
    /// The pragma value.
    pub fn as_str(self) -> &'static str {
        match self {
            JournalMode::Delete => "delete",
            JournalMode::Truncate => "truncate",
            JournalMode::Persist => "persist",
            JournalMode::Memory => "memory",
            JournalMode::Wal => "wal",
            JournalMode::Off => "off",
        }
    }

    /// Returns true for the write-ahead log mode.
    pub fn is_wal(self) -> bool {
        self == JournalMode::Wal
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JournalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(JournalMode::Delete),
            "truncate" => Ok(JournalMode::Truncate),
            "persist" => Ok(JournalMode::Persist),
            "memory" => Ok(JournalMode::Memory),
            "wal" => Ok(JournalMode::Wal),
            "off" => Ok(JournalMode::Off),
            other => Err(Error::Config(format!("unknown journal mode '{other}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for JournalMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Database Wrapper
// =============================================================================

/// A SQLite connection with the log schema in place.
///
/// Consumed by [`Database::into_connection`] when the sink hands the
/// connection to its write lock.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    journal_mode: String,
}

impl Database {
    /// Opens (or creates) the store at `path` and ensures the schema.
    ///
    /// # Errors
    ///
    /// - `Error::Sqlite` if the file cannot be opened or the DDL fails
    /// - `Error::Schema` if SQLite refuses the requested journal mode
    pub fn open(path: impl AsRef<Path>, mode: JournalMode) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::initialize(conn, mode, true)
    }

    /// Creates a private in-memory store. SQLite reports its journal mode as
    /// `memory` whatever was requested.
    pub fn open_in_memory(mode: JournalMode) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, mode, false)
    }

    fn initialize(conn: Connection, mode: JournalMode, check_mode: bool) -> Result<Self> {
        let journal_mode = apply_journal_mode(&conn, mode)?;
        if check_mode && journal_mode != mode.as_str() {
            return Err(Error::Schema(format!(
                "journal mode '{mode}' was not applied (store reports '{journal_mode}')"
            )));
        }

        // WAL is durable at checkpoint; NORMAL skips the fsync on every commit.
        if mode.is_wal() {
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }

        ensure_schema(&conn)?;

        tracing::debug!(
            target: SELFLOG_TARGET,
            requested = %mode,
            effective = %journal_mode,
            "log store schema ready"
        );
        Ok(Self { conn, journal_mode })
    }

    /// The journal mode SQLite reported after opening.
    pub fn journal_mode(&self) -> &str {
        &self.journal_mode
    }

    /// Releases the connection for use by the writer.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Borrow the connection (tests only).
    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Creates the `Logs` table and its indexes if they are missing.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_LOGS)?;
    conn.execute_batch(CREATE_TIMESTAMP_INDEX)?;
    conn.execute_batch(CREATE_REQUEST_ID_INDEX)?;
    Ok(())
}

/// Sets `PRAGMA journal_mode` and returns the mode SQLite actually applied.
pub fn apply_journal_mode(conn: &Connection, mode: JournalMode) -> Result<String> {
    let applied: String =
        conn.pragma_update_and_check(None, "journal_mode", mode.as_str(), |row| row.get(0))?;
    Ok(applied.to_ascii_lowercase())
}

// =============================================================================
// Tests
// =============================================================================
