#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use sqlite_log_sink::codec::format_timestamp;
use sqlite_log_sink::{Database, JournalMode, LogLevel, LogRecord, SinkOptions, StoredRow};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sqlite_log_sink=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Returns a temp dir and a not-yet-created database path inside it.
pub fn temp_db_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

/// Options for a file store; only the startup purge runs during a test.
pub fn test_options(path: &Path) -> SinkOptions {
    SinkOptions::new(path).with_purge_interval(Duration::from_secs(3600))
}

/// Creates the store and inserts rows with the given ages, bypassing the sink.
pub fn seed_rows(path: &Path, ages: &[(chrono::Duration, &str)]) {
    let conn = Database::open(path, JournalMode::Delete)
        .expect("initialize database")
        .into_connection();
    for (age, message) in ages {
        conn.execute(
            "INSERT INTO Logs (Timestamp, Level, Message) VALUES (?1, 'Information', ?2)",
            rusqlite::params![format_timestamp(Utc::now() - *age), message],
        )
        .expect("seed row");
    }
}

pub fn open_read_only(path: &Path) -> Connection {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .expect("open read-only connection")
}

pub fn count_rows(path: &Path) -> i64 {
    open_read_only(path)
        .query_row("SELECT COUNT(*) FROM Logs", [], |row| row.get(0))
        .expect("count rows")
}

pub fn read_rows(path: &Path) -> Vec<StoredRow> {
    let conn = open_read_only(path);
    let sql = format!("SELECT {} FROM Logs ORDER BY Id", StoredRow::SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql).expect("prepare select");
    let rows = stmt
        .query_map([], StoredRow::from_row)
        .expect("query rows")
        .collect::<Result<Vec<_>, _>>()
        .expect("map rows");
    rows
}

pub fn numbered(n: usize) -> LogRecord {
    LogRecord::new(LogLevel::Information, format!("record {n}"))
        .with_property("seq", n as u64)
}

pub async fn eventually<T>(
    timeout: Duration,
    interval: Duration,
    mut f: impl FnMut() -> Option<T>,
) -> T {
    let start = std::time::Instant::now();
    loop {
        if let Some(v) = f() {
            return v;
        }
        if start.elapsed() > timeout {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(interval).await;
    }
}
