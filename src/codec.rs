//! # Record Shaping
//!
//! This module turns a [`LogRecord`] into the flat set of column values that
//! the batch writer binds to its insert statement. It is pure: no I/O, no
//! shared state, so it can run inside the writer's transaction without
//! holding anything but the record.
//!
//! ## Column Mapping
//!
//! ```text
//! LogRecord                          Logs row
//! ─────────────────────────────      ─────────────────────────────
//! timestamp (any offset)        ───► Timestamp  (UTC, fixed width)
//! level                         ───► Level      (name)
//! message                       ───► Message
//! message_template              ───► MessageTemplate (if tracked)
//! correlation / reserved props  ───► SourceContext, RequestId, TraceId, SpanId
//! remaining properties          ───► Properties (compact JSON or NULL)
//! exception                     ───► Exception  (or NULL)
//! ```
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as `YYYY-MM-DDTHH:MM:SS.ffffffZ`. Every value has the
//! same width, so comparing the text compares the instants. The retention
//! purger relies on this: its `Timestamp < ?` predicate is a plain string
//! comparison served by the timestamp index.
//!
//! Instants outside years 0000 through 9999 are clamped to the nearest end
//! of that range before formatting.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::LogRecord;

// =============================================================================
// Reserved Properties
// =============================================================================

/// Property carrying the source/context identifier.
pub const SOURCE_CONTEXT_PROPERTY: &str = "SourceContext";

/// Property carrying the request identifier.
pub const REQUEST_ID_PROPERTY: &str = "RequestId";

/// Property carrying the trace identifier.
pub const TRACE_ID_PROPERTY: &str = "TraceId";

/// Property carrying the span identifier.
pub const SPAN_ID_PROPERTY: &str = "SpanId";

/// Property names promoted to dedicated columns and never written to the
/// properties blob.
pub const RESERVED_PROPERTIES: [&str; 4] = [
    SOURCE_CONTEXT_PROPERTY,
    REQUEST_ID_PROPERTY,
    TRACE_ID_PROPERTY,
    SPAN_ID_PROPERTY,
];

// =============================================================================
// Shaped Row
// =============================================================================

/// Column values for one insert, in the order of the insert statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedRow {
    pub timestamp: String,
    pub level: &'static str,
    pub message: String,
    pub message_template: Option<String>,
    pub properties: Option<String>,
    pub source_context: Option<String>,
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub exception: Option<String>,
}

// =============================================================================
// Shaping
// =============================================================================

/// Shapes a record into column values.
///
/// `track_template` controls whether the message template is kept; when it
/// is false the `MessageTemplate` column is NULL.
///
/// # Errors
///
/// `Error::Json` if the remaining properties cannot be serialized.
pub fn shape_record(record: &LogRecord, track_template: bool) -> Result<ShapedRow> {
    let ids = &record.correlation;
    let props = &record.properties;

    Ok(ShapedRow {
        timestamp: format_timestamp(record.timestamp.with_timezone(&Utc)),
        level: record.level.as_str(),
        message: record.message.clone(),
        message_template: if track_template {
            record.message_template.clone()
        } else {
            None
        },
        properties: properties_json(props)?,
        source_context: promote(&ids.source_context, props, SOURCE_CONTEXT_PROPERTY),
        request_id: promote(&ids.request_id, props, REQUEST_ID_PROPERTY),
        trace_id: promote(&ids.trace_id, props, TRACE_ID_PROPERTY),
        span_id: promote(&ids.span_id, props, SPAN_ID_PROPERTY),
        exception: record.exception.clone(),
    })
}

/// Serializes the non-reserved properties to a compact JSON object.
///
/// Returns `None` when nothing remains after removing the reserved names, so
/// the column holds NULL rather than `{}`.
pub fn properties_json(properties: &Map<String, Value>) -> Result<Option<String>> {
    let remaining: Map<String, Value> = properties
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if remaining.is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::to_string(&remaining)?))
}

/// 0000-01-01T00:00:00Z
const EARLIEST_COLUMN_SECONDS: i64 = -62_167_219_200;

/// 9999-12-31T23:59:59Z
const LATEST_COLUMN_SECONDS: i64 = 253_402_300_799;

/// Formats an instant the way the `Timestamp` column stores it.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    clamp_to_column_range(timestamp).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Pins `timestamp` to the four-digit-year range so the text keeps its width.
fn clamp_to_column_range(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let secs = timestamp.timestamp();
    let bound = if secs < EARLIEST_COLUMN_SECONDS {
        DateTime::from_timestamp(EARLIEST_COLUMN_SECONDS, 0)
    } else if secs > LATEST_COLUMN_SECONDS {
        DateTime::from_timestamp(LATEST_COLUMN_SECONDS, 999_999_000)
    } else {
        None
    };
    bound.unwrap_or(timestamp)
}

/// Returns true if `name` is promoted to its own column.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_PROPERTIES.contains(&name)
}

/// Picks the explicit identifier, falling back to the reserved property.
fn promote(explicit: &Option<String>, properties: &Map<String, Value>, name: &str) -> Option<String> {
    if let Some(value) = explicit {
        return Some(value.clone());
    }

    match properties.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
