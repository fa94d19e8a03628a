//! # Batch Writer with Group Commit
//!
//! This module drains the ingestion queue into the store. Records are
//! collected into batches and each batch is written in a single SQLite
//! transaction, so a burst of events costs one commit instead of one per event.
//!
//! ```text
//! Without batching:                With batching:
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │ r1 → BEGIN → COMMIT      │     │ BEGIN IMMEDIATE          │
//! │ r2 → BEGIN → COMMIT      │     │   INSERT r1              │
//! │ r3 → BEGIN → COMMIT      │     │   INSERT r2              │
//! │ ...                      │     │   INSERT r3              │
//! │ 100 fsyncs               │     │ COMMIT                   │
//! └──────────────────────────┘     │ 1 fsync                  │
//!                                  └──────────────────────────┘
//! ```
//!
//! ## Ingestion Channel
//!
//! Producers reach the writer through a bounded `tokio::sync::mpsc` channel
//! of `queue_capacity` records. [`BatchWriterHandle::try_submit`] never
//! waits: a full or closed channel refuses the record.
//!
//! ```text
//!  producers            ┌──────────────── capacity ───────────────┐
//!  try_submit() ──►     │ r1 │ r2 │ r3 │ ... │ rN │               │ ──► recv + try_recv
//!               full?   └─────────────────────────────────────────┘
//!               drop
//! ```
//!
//! ## Write Cycle
//!
//! 1. Wait for the first record (no lock held)
//! 2. Acquire the write lock
//! 3. Take more records with `try_recv` until `batch_max_size` is reached or
//!    the channel is momentarily empty
//! 4. `BEGIN IMMEDIATE`, insert each shaped record, `COMMIT`
//! 5. Release the lock
//!
//! Records that arrive while a batch is being written wait for the next
//! cycle. On the shutdown signal the receiver is closed: new records are
//! refused, buffered ones are still drained, and the loop exits once
//! `recv` returns `None`.
//!
//! ## Failure Handling
//!
//! A batch is all-or-nothing. If any record fails to shape or insert, or the
//! commit fails, the transaction is rolled back and the whole batch is
//! discarded. The failure is reported on the diagnostic side-channel and
//! counted; the loop continues with the next batch.
//!
//! ## Invariants
//!
//! - At most one transaction is open at a time (enforced by [`WriteLock`])
//! - Within a batch, rows are inserted in dequeue order, so `Id` follows
//!   acceptance order
//! - Every dequeued record is either committed or counted as lost

use std::sync::Arc;
use std::thread::JoinHandle;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use crate::codec::shape_record;
use crate::error::Result;
use crate::lock::WriteLock;
use crate::metrics::SinkMetrics;
use crate::schema::INSERT_LOG;
use crate::types::LogRecord;
use crate::SELFLOG_TARGET;

/// Name of the writer thread.
pub const WRITER_THREAD_NAME: &str = "sqlite-sink-writer";

// =============================================================================
// Ingestion Channel
// =============================================================================

/// Producer side of the ingestion channel.
///
/// Cheap to clone; every clone feeds the same writer.
#[derive(Debug, Clone)]
pub struct BatchWriterHandle {
    tx: mpsc::Sender<LogRecord>,
}

impl BatchWriterHandle {
    /// Offers a record without waiting.
    ///
    /// Returns `false` if the channel is full or the writer has closed it.
    pub fn try_submit(&self, record: LogRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Records buffered and not yet taken by the writer.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Maximum records the channel buffers.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Returns true once the writer has closed its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates the bounded ingestion channel. A zero capacity is raised to one.
pub fn ingest_channel(capacity: usize) -> (BatchWriterHandle, mpsc::Receiver<LogRecord>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BatchWriterHandle { tx }, rx)
}

// =============================================================================
// Batch Writer
// =============================================================================

/// Writes batches of records inside one transaction each.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    batch_max_size: usize,
    track_template: bool,
    metrics: Arc<SinkMetrics>,
}

impl BatchWriter {
    pub fn new(batch_max_size: usize, track_template: bool, metrics: Arc<SinkMetrics>) -> Self {
        Self {
            batch_max_size,
            track_template,
            metrics,
        }
    }

    /// Maximum records taken per cycle.
    pub fn batch_max_size(&self) -> usize {
        self.batch_max_size
    }

    /// Writes `records` in one immediate transaction.
    ///
    /// Returns the number of rows committed. On failure the transaction is
    /// rolled back, the batch counted as lost and the error returned; no row
    /// from the batch is visible.
    pub fn execute_batch(&self, conn: &mut Connection, records: Vec<LogRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        match self.execute_batch_inner(conn, &records) {
            Ok(written) => {
                self.metrics.record_batch_committed(written);
                Ok(written)
            }
            Err(e) => {
                self.metrics.record_batch_failed(count);
                tracing::error!(
                    target: SELFLOG_TARGET,
                    error = %e,
                    records = count,
                    "failed to write log batch, batch discarded"
                );
                Err(e)
            }
        }
    }

    fn execute_batch_inner(&self, conn: &mut Connection, records: &[LogRecord]) -> Result<usize> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match self.insert_all(&tx, records) {
            Ok(written) => {
                tx.commit()?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(
                        target: SELFLOG_TARGET,
                        error = %rollback_err,
                        "failed to roll back log batch"
                    );
                }
                Err(e)
            }
        }
    }

    fn insert_all(&self, tx: &Transaction<'_>, records: &[LogRecord]) -> Result<usize> {
        let mut stmt = tx.prepare_cached(INSERT_LOG)?;

        for record in records {
            let row = shape_record(record, self.track_template)?;
            stmt.execute(params![
                row.timestamp,
                row.level,
                row.message,
                row.message_template,
                row.properties,
                row.source_context,
                row.request_id,
                row.trace_id,
                row.span_id,
                row.exception,
            ])?;
        }

        Ok(records.len())
    }
}

// =============================================================================
// Writer Loop
// =============================================================================

/// Runs the writer loop until the channel is closed and drained.
///
/// The channel closes when `shutdown` changes (or its sender is dropped), or
/// when every [`BatchWriterHandle`] is gone.
pub async fn run_batch_writer(
    writer: BatchWriter,
    mut rx: mpsc::Receiver<LogRecord>,
    lock: Arc<WriteLock>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut closing = false;

    loop {
        let first = tokio::select! {
            record = rx.recv() => record,
            _ = shutdown.changed(), if !closing => {
                // Refuse new records; buffered ones stay readable.
                rx.close();
                closing = true;
                continue;
            }
        };

        let Some(first) = first else {
            break;
        };

        let mut conn = lock.acquire().await;

        let max = writer.batch_max_size();
        let mut batch = Vec::with_capacity(max.min(256));
        batch.push(first);
        while batch.len() < max {
            match rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }

        let size = batch.len();
        if writer.execute_batch(&mut conn, batch).is_ok() {
            tracing::trace!(target: SELFLOG_TARGET, rows = size, "log batch committed");
        }
    }

    tracing::debug!(target: SELFLOG_TARGET, "batch writer drained and stopped");
}

/// Spawns the writer loop on a dedicated thread with its own runtime.
pub fn spawn_batch_writer(
    writer: BatchWriter,
    rx: mpsc::Receiver<LogRecord>,
    lock: Arc<WriteLock>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let handle = std::thread::Builder::new()
        .name(WRITER_THREAD_NAME.to_string())
        .spawn(move || {
            rt.block_on(run_batch_writer(writer, rx, lock, shutdown));
        })?;

    Ok(handle)
}

// =============================================================================
// Tests
// =============================================================================
