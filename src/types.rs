//! # Domain Types for the SQLite Sink
//!
//! This module defines the record that flows from a producer into the sink
//! ([`LogRecord`]) and the row that ends up in the store ([`StoredRow`]).
//!
//! ## Ownership
//!
//! A [`LogRecord`] is owned by the caller until [`SqliteSink::emit`] accepts
//! it, then by the ingestion queue until the batch writer dequeues it. It is
//! dropped after its insert, whether the insert succeeded or not.
//!
//! ## Invariants
//!
//! - Exactly one row is produced per accepted record
//! - Promoted identifiers (see [`CorrelationIds`]) never appear inside the
//!   serialized properties blob
//!
//! [`SqliteSink::emit`]: crate::SqliteSink::emit

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// =============================================================================
// Severity
// =============================================================================

/// Severity of a log record.
///
/// Stored in the `Level` column by name (see [`LogLevel::as_str`]). Variants
/// are ordered from least to most severe, so `LogLevel::Warning > LogLevel::Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Very detailed diagnostic output.
    Trace,
    /// Internal events useful while debugging.
    Debug,
    /// Normal operational events.
    Information,
    /// Something unexpected that the application recovered from.
    Warning,
    /// A failure of the current operation.
    Error,
    /// A failure that brings the application down.
    Fatal,
}

impl LogLevel {
    /// All levels, least severe first.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Information,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// The name written to the `Level` column.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "Trace",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    /// Parses a level name case-insensitively. Short forms (`info`, `warn`)
    /// are accepted as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "verbose" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "information" | "info" => Ok(LogLevel::Information),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "fatal" | "critical" => Ok(LogLevel::Fatal),
            other => Err(Error::Config(format!("unknown log level '{other}'"))),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

// =============================================================================
// Correlation Identifiers
// =============================================================================

/// Identifiers that are promoted to dedicated columns.
///
/// Each one may also arrive as a reserved property (`SourceContext`,
/// `RequestId`, `TraceId`, `SpanId`). When both are present the explicit field
/// here wins; the reserved property is dropped from the blob either way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationIds {
    /// Source/context identifier, usually the emitting module or type.
    pub source_context: Option<String>,

    /// Request identifier, the primary correlation key (indexed).
    pub request_id: Option<String>,

    /// Distributed trace identifier.
    pub trace_id: Option<String>,

    /// Span identifier within the trace.
    pub span_id: Option<String>,
}

impl CorrelationIds {
    /// Returns true when no identifier is set.
    pub fn is_empty(&self) -> bool {
        self.source_context.is_none()
            && self.request_id.is_none()
            && self.trace_id.is_none()
            && self.span_id.is_none()
    }
}

// =============================================================================
// Log Record
// =============================================================================

/// One structured event accepted for persistence.
///
/// Built with the `with_*` methods:
///
/// ```rust
/// use sqlite_log_sink::{LogLevel, LogRecord};
///
/// let record = LogRecord::new(LogLevel::Information, "User alice logged in")
///     .with_template("User {user} logged in")
///     .with_property("user", "alice")
///     .with_request_id("req-42");
///
/// assert_eq!(record.correlation.request_id.as_deref(), Some("req-42"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the event happened, in whatever offset the producer observed.
    /// Normalized to UTC when the row is shaped.
    pub timestamp: DateTime<FixedOffset>,

    /// Severity.
    pub level: LogLevel,

    /// Fully rendered message text.
    pub message: String,

    /// The unsubstituted message template, if the producer has one.
    pub message_template: Option<String>,

    /// Structured properties. Reserved names are promoted on insert.
    pub properties: Map<String, Value>,

    /// Formatted error trace, if the event carries one.
    pub exception: Option<String>,

    /// Promoted identifiers.
    pub correlation: CorrelationIds,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().fixed_offset(),
            level,
            message: message.into(),
            message_template: None,
            properties: Map::new(),
            exception: None,
            correlation: CorrelationIds::default(),
        }
    }

    /// Overrides the timestamp. Any time zone is accepted.
    pub fn with_timestamp<Tz: TimeZone>(mut self, timestamp: DateTime<Tz>) -> Self {
        self.timestamp = timestamp.fixed_offset();
        self
    }

    /// Sets the message template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }

    /// Adds (or replaces) a structured property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Attaches pre-formatted exception text.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Attaches an error, rendering it together with its `source()` chain.
    pub fn with_error(self, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut text = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            text.push_str("\nCaused by: ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        self.with_exception(text)
    }

    /// Sets the source/context identifier.
    pub fn with_source_context(mut self, source_context: impl Into<String>) -> Self {
        self.correlation.source_context = Some(source_context.into());
        self
    }

    /// Sets the request identifier.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.correlation.request_id = Some(request_id.into());
        self
    }

    /// Sets the trace identifier.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.correlation.trace_id = Some(trace_id.into());
        self
    }

    /// Sets the span identifier.
    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.correlation.span_id = Some(span_id.into());
        self
    }
}

// =============================================================================
// Stored Row
// =============================================================================

/// The persisted form of a record, one per row of the `Logs` table.
///
/// Rows are immutable once written; only the retention purger removes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Store-assigned surrogate key, strictly increasing in commit order.
    pub id: i64,
    /// UTC timestamp text (`YYYY-MM-DDTHH:MM:SS.ffffffZ`).
    pub timestamp: String,
    /// Source/context identifier.
    pub source_context: Option<String>,
    /// Level name.
    pub level: String,
    /// Rendered message.
    pub message: Option<String>,
    /// Message template, when tracked.
    pub message_template: Option<String>,
    /// Request identifier.
    pub request_id: Option<String>,
    /// Trace identifier.
    pub trace_id: Option<String>,
    /// Span identifier.
    pub span_id: Option<String>,
    /// Compact JSON object of the remaining properties, or NULL.
    pub properties: Option<String>,
    /// Exception text, or NULL.
    pub exception: Option<String>,
}

impl StoredRow {
    /// Column list matching [`StoredRow::from_row`].
    pub const SELECT_COLUMNS: &'static str = "Id, Timestamp, SourceContext, Level, Message, \
         MessageTemplate, RequestId, TraceId, SpanId, Properties, Exception";

    /// Maps a row selected with [`StoredRow::SELECT_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            source_context: row.get(2)?,
            level: row.get(3)?,
            message: row.get(4)?,
            message_template: row.get(5)?,
            request_id: row.get(6)?,
            trace_id: row.get(7)?,
            span_id: row.get(8)?,
            properties: row.get(9)?,
            exception: row.get(10)?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
