//! # Error Handling for the SQLite Sink
//!
//! A single error enum ([`Error`]) covers every failure the crate can report.
//! Only construction-time failures ever reach a caller: once the sink is
//! running, the background workers catch errors at the smallest enclosing
//! scope and report them on the diagnostic side-channel instead.
//!
//! ## Error Categories
//!
//! | Category | Examples | Where it surfaces |
//! |----------|----------|-------------------|
//! | Fatal | store cannot be opened, schema cannot be created | `SqliteSink::open` |
//! | Configuration | zero queue capacity, bad duration string | `SinkOptions::validate`, deserialization |
//! | Batch-scoped | insert or commit fails | logged, batch rolled back |
//! | Cycle-scoped | retention delete fails | logged, next cycle retries |
//! | Shutdown-scoped | journal switch or close fails | logged, shutdown completes |

use thiserror::Error;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in sink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite operation failed.
    ///
    /// # When This Happens
    ///
    /// - The database file cannot be opened or created
    /// - The disk is full or the file is locked by another process
    /// - An insert, commit or delete fails inside a worker
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Structured properties could not be serialized to JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure outside SQLite (creating the store directory, spawning a
    /// worker thread or building its runtime).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The supplied [`SinkOptions`](crate::SinkOptions) are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The store did not accept the schema or journal mode it was given.
    #[error("schema error: {0}")]
    Schema(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config = Error::Config("queue_capacity must be greater than zero".to_string());
        assert_eq!(
            config.to_string(),
            "invalid configuration: queue_capacity must be greater than zero"
        );

        let schema = Error::Schema("journal mode 'wal' was not applied".to_string());
        assert_eq!(
            schema.to_string(),
            "schema error: journal mode 'wal' was not applied"
        );
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let sqlite_err = rusqlite::Error::InvalidParameterName("@ts".to_string());
        let our_err: Error = sqlite_err.into();

        assert!(matches!(our_err, Error::Sqlite(_)));
        assert!(our_err.to_string().contains("sqlite error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let our_err: Error = io_err.into();

        assert!(matches!(our_err, Error::Io(_)));
        assert!(our_err.to_string().contains("read-only"));
    }
}
