//! # Sink Configuration
//!
//! [`SinkOptions`] is the whole configuration surface: where the store lives,
//! which journal mode it runs in, how long rows are kept and how the queue and
//! batches are sized. Options are fixed once the sink is opened.
//!
//! ## Loading From a File
//!
//! `SinkOptions` deserializes with serde. Every field except `path` has a
//! default, and durations use humantime notation:
//!
//! ```rust
//! use sqlite_log_sink::{JournalMode, SinkOptions};
//!
//! let options: SinkOptions = serde_json::from_str(
//!     r#"{ "path": "logs/app.db", "retention": "3d", "journal_mode": "delete" }"#,
//! ).unwrap();
//!
//! assert_eq!(options.retention.as_secs(), 3 * 24 * 3600);
//! assert_eq!(options.journal_mode, JournalMode::Delete);
//! assert_eq!(options.queue_capacity, 2048);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::schema::JournalMode;

// =============================================================================
// Defaults
// =============================================================================

/// Default retention horizon: 7 days.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default ingestion queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2048;

/// Default maximum records committed in one transaction.
pub const DEFAULT_BATCH_MAX_SIZE: usize = 2048;

/// Default period between retention purges: 10 minutes.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

// =============================================================================
// Options
// =============================================================================

/// Configuration for [`SqliteSink`](crate::SqliteSink).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SinkOptions {
    /// Path to the SQLite database file. Parent directories are created on
    /// open. `":memory:"` gives a private in-memory store.
    pub path: PathBuf,

    /// Journal mode applied when the store is opened.
    #[serde(default)]
    pub journal_mode: JournalMode,

    /// Rows strictly older than `now - retention` are purged.
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,

    /// Maximum records waiting in the ingestion queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum records committed in one transaction.
    #[serde(default = "default_batch_max_size")]
    pub batch_max_size: usize,

    /// Time between retention purges.
    #[serde(default = "default_purge_interval", with = "humantime_serde")]
    pub purge_interval: Duration,

    /// Whether the `MessageTemplate` column is populated.
    #[serde(default = "default_track_message_template")]
    pub track_message_template: bool,
}

impl SinkOptions {
    /// Creates options for `path` with every other field at its default.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            journal_mode: JournalMode::default(),
            retention: DEFAULT_RETENTION,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_max_size: DEFAULT_BATCH_MAX_SIZE,
            purge_interval: DEFAULT_PURGE_INTERVAL,
            track_message_template: true,
        }
    }

    /// Sets the journal mode.
    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Sets the retention horizon.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the ingestion queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the per-transaction batch ceiling.
    pub fn with_batch_max_size(mut self, size: usize) -> Self {
        self.batch_max_size = size;
        self
    }

    /// Sets the purge period.
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Enables or disables storing message templates.
    pub fn with_message_template(mut self, track: bool) -> Self {
        self.track_message_template = track;
        self
    }

    /// Returns true if the store is a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }

    /// Checks the options for values the sink cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::Config("path must not be empty".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.batch_max_size == 0 {
            return Err(Error::Config(
                "batch_max_size must be greater than zero".to_string(),
            ));
        }
        if self.purge_interval.is_zero() {
            return Err(Error::Config(
                "purge_interval must be greater than zero".to_string(),
            ));
        }
        if chrono::Duration::from_std(self.retention).is_err() {
            return Err(Error::Config(format!(
                "retention {} is out of range",
                humantime::format_duration(self.retention)
            )));
        }
        Ok(())
    }
}

fn default_retention() -> Duration {
    DEFAULT_RETENTION
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_batch_max_size() -> usize {
    DEFAULT_BATCH_MAX_SIZE
}

fn default_purge_interval() -> Duration {
    DEFAULT_PURGE_INTERVAL
}

fn default_track_message_template() -> bool {
    true
}

/// Parses a humantime duration (`30s`, `10m`, `7d`, `1h30m`).
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Config("duration string is empty".to_string()));
    }
    humantime::parse_duration(s).map_err(|e| Error::Config(format!("invalid duration '{s}': {e}")))
}

// =============================================================================
// Tests
// =============================================================================
