//! # sqlite-log-sink - Batched SQLite Log Persistence
//!
//! A log sink that persists structured log records into a single SQLite
//! table. It provides:
//!
//! - **Non-blocking ingestion**: `emit` never waits; overflow is shed
//! - **Group commit**: one transaction per batch of up to 2048 records
//! - **Retention**: rows older than the horizon are purged periodically
//! - **Clean shutdown**: drains accepted records and leaves a single-file store
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Caller threads: emit()                       │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ try_send (drop when full)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Ingestion channel (tokio mpsc)                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────┐     ┌────────────────────────────────┐
//! │       Batch Writer       │     │        Retention Purger        │
//! │ shape + insert, 1 tx per │     │ DELETE rows older than horizon │
//! │          batch           │     │    every purge_interval        │
//! └────────────┬─────────────┘     └───────────────┬────────────────┘
//!              └──────────────┬────────────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Write Lock (owns the SQLite connection)            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. **One row per accepted record**: unless its batch fails, in which case
//!    the batch is counted as lost
//! 2. **FIFO**: rows are inserted in acceptance order, so `Id` follows it
//! 3. **One transaction at a time**: writer and purger never overlap
//! 4. **Callers never see storage errors**: failures go to [`SELFLOG_TARGET`]
//!
//! ## Diagnostics
//!
//! Internal failures are reported with `tracing` under [`SELFLOG_TARGET`].
//! Hosts that also feed `tracing` events into this sink should filter that
//! target out of the sink's input.
//!
//! ## Module Organization
//!
//! - [`error`]: Error enum and `Result` alias
//! - [`config`]: `SinkOptions` and its defaults
//! - [`types`]: `LogRecord`, `LogLevel`, `StoredRow`
//! - [`codec`]: Record shaping into column values
//! - [`schema`]: DDL, journal mode, store initialization
//! - [`lock`]: Write lock around the connection
//! - [`writer`]: Ingestion channel and batch writer
//! - [`retention`]: Retention purger
//! - [`metrics`]: Counters
//! - [`api`]: `SqliteSink` (main entry point)

// =============================================================================
// Module Declarations
// =============================================================================

/// Error types for sink operations.
pub mod error;

/// Sink configuration.
///
/// Every option has a default except the store path. Options can be built in
/// code or deserialized, with durations in humantime notation.
pub mod config;

/// Domain types: the incoming record and the stored row.
pub mod types;

/// Record shaping.
///
/// Converts a [`LogRecord`] into the values bound to the insert statement:
/// UTC timestamp text, promoted identifiers and the compact properties blob.
pub mod codec;

/// SQLite schema definitions and store initialization.
pub mod schema;

/// Mutual exclusion for the single store connection.
pub mod lock;

/// Batch writer with group commit.
///
/// Owns the bounded ingestion channel. Drains it in batches of at most
/// `batch_max_size` records and writes
/// each batch in one `BEGIN IMMEDIATE` transaction. A failing batch is rolled
/// back as a whole and the writer carries on.
pub mod writer;

/// Periodic deletion of rows past the retention horizon.
pub mod retention;

/// Sink counters.
pub mod metrics;

/// Lifecycle controller.
///
/// The main entry point is [`SqliteSink`](api::SqliteSink).
pub mod api;

// =============================================================================
// Diagnostics
// =============================================================================

/// `tracing` target for the sink's own diagnostics.
pub const SELFLOG_TARGET: &str = "sqlite_log_sink::selflog";

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{LogEventSink, SinkState, SqliteSink};
pub use config::SinkOptions;
pub use error::{Error, Result};
pub use metrics::MetricsSnapshot;
pub use schema::{Database, JournalMode};
pub use types::{CorrelationIds, LogLevel, LogRecord, StoredRow};
