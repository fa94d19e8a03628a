//! Stored Row Shape Tests
//!
//! Checks what actually lands in the `Logs` columns for records emitted
//! through the sink.

mod common;

use chrono::{FixedOffset, TimeZone};
use serde_json::{json, Value};
use sqlite_log_sink::{LogLevel, LogRecord, SqliteSink};

fn write_one(record: LogRecord, track_template: bool) -> sqlite_log_sink::StoredRow {
    let (_dir, path) = common::temp_db_path("shape.db");
    let sink = SqliteSink::open(common::test_options(&path).with_message_template(track_template)).unwrap();
    assert!(sink.emit(record));
    sink.shutdown();

    let mut rows = common::read_rows(&path);
    assert_eq!(rows.len(), 1);
    rows.remove(0)
}

#[test]
fn properties_roundtrip_as_json_object() {
    let record = LogRecord::new(LogLevel::Information, "User alice logged in")
        .with_template("User {user} logged in")
        .with_property("user", "alice")
        .with_property("attempts", 3);

    let row = write_one(record, true);
    let props: Value = serde_json::from_str(row.properties.as_deref().unwrap()).unwrap();
    assert_eq!(props, json!({"user": "alice", "attempts": 3}));
    assert_eq!(row.message.as_deref(), Some("User alice logged in"));
    assert_eq!(row.message_template.as_deref(), Some("User {user} logged in"));
    assert_eq!(row.level, "Information");
}

#[test]
fn reserved_properties_land_in_columns_only() {
    let record = LogRecord::new(LogLevel::Warning, "slow")
        .with_property("SourceContext", "app::orders")
        .with_property("RequestId", "req-9")
        .with_property("TraceId", "t-1")
        .with_property("SpanId", "s-1");

    let row = write_one(record, true);
    assert_eq!(row.source_context.as_deref(), Some("app::orders"));
    assert_eq!(row.request_id.as_deref(), Some("req-9"));
    assert_eq!(row.trace_id.as_deref(), Some("t-1"));
    assert_eq!(row.span_id.as_deref(), Some("s-1"));
    assert_eq!(row.properties, None);
}

#[test]
fn timestamp_is_normalized_to_utc() {
    let offset = FixedOffset::east_opt(9 * 3600).unwrap();
    let local = offset.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    let record = LogRecord::new(LogLevel::Debug, "tokyo morning").with_timestamp(local);

    let row = write_one(record, true);
    assert_eq!(row.timestamp, "2024-04-30T23:30:00.000000Z");
}

#[test]
fn exception_and_untracked_template() {
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml missing");
    let record = LogRecord::new(LogLevel::Error, "startup failed")
        .with_template("startup failed")
        .with_error(&err);

    let row = write_one(record, false);
    assert_eq!(row.exception.as_deref(), Some("config.toml missing"));
    assert_eq!(row.message_template, None);
    assert!(row.id > 0);
}
