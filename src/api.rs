//! # Sink Lifecycle
//!
//! [`SqliteSink`] is the public handle. It owns the ingestion channel, the two
//! background workers and, through the write lock, the store connection.
//!
//! ## Threads
//!
//! SQLite's `Connection` is `!Sync`, and `shutdown()` must finish
//! synchronously even when called from outside any async runtime. Each worker
//! therefore runs on its own OS thread with a current-thread tokio runtime,
//! and shutdown joins the threads:
//!
//! ```text
//!  caller threads                    sqlite-sink-writer          sqlite-sink-purger
//!  ──────────────                    ──────────────────          ──────────────────
//!  emit() ──► mpsc channel ────────► recv / try_recv            purge_once
//!                                        │                           │
//!                                        └──────► WriteLock ◄────────┘
//!                                                (Connection)
//! ```
//!
//! ## States
//!
//! ```text
//! Starting ──open ok──► Running ──shutdown()──► Draining ──workers joined──► Stopped
//! ```
//!
//! - `Starting`: store opened, schema ensured, workers spawned. Any failure
//!   is returned from [`SqliteSink::open`].
//! - `Running`: [`SqliteSink::emit`] accepts records.
//! - `Draining`: the writer closes the channel (no new records), the purger's
//!   sleep is cancelled, and both threads are joined. Records accepted before
//!   the call are still written.
//! - `Stopped`: if WAL was configured the store is switched back to a
//!   rollback journal so no `-wal`/`-shm` files are left behind, then the
//!   connection is closed. Failures in this phase are logged only.
//!
//! `shutdown()` is idempotent and also runs when the sink is dropped. A caller
//! that races an in-progress shutdown blocks until the state is `Stopped`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::watch;

use crate::config::SinkOptions;
use crate::error::Result;
use crate::lock::WriteLock;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::retention::spawn_purger;
use crate::schema::{apply_journal_mode, Database, JournalMode};
use crate::types::LogRecord;
use crate::writer::{ingest_channel, spawn_batch_writer, BatchWriter, BatchWriterHandle};
use crate::SELFLOG_TARGET;

// =============================================================================
// Sink State
// =============================================================================

/// Lifecycle state of a [`SqliteSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SinkState {
    Starting = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl SinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SinkState::Starting,
            1 => SinkState::Running,
            2 => SinkState::Draining,
            _ => SinkState::Stopped,
        }
    }
}

// =============================================================================
// Host Pipeline Seam
// =============================================================================

/// The two entry points a logging pipeline drives.
pub trait LogEventSink: Send + Sync {
    /// Offers one record. Never blocks; returns whether it was accepted.
    fn emit(&self, record: LogRecord) -> bool;

    /// Flushes accepted records and releases the store. Called once at
    /// teardown; must return only when the work is done.
    fn dispose(&self);
}

// =============================================================================
// SqliteSink
// =============================================================================

/// Background handles owned until shutdown.
#[derive(Debug)]
struct Workers {
    writer: JoinHandle<()>,
    purger: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    lock: Arc<WriteLock>,
}

/// A batched, non-blocking log sink backed by a SQLite table.
///
/// # Example
///
/// ```rust,no_run
/// use sqlite_log_sink::{LogLevel, LogRecord, SinkOptions, SqliteSink};
///
/// let sink = SqliteSink::open(SinkOptions::new("logs/app.db"))?;
/// sink.emit(LogRecord::new(LogLevel::Information, "started").with_property("version", "1.2.0"));
/// sink.shutdown();
/// # Ok::<(), sqlite_log_sink::Error>(())
/// ```
#[derive(Debug)]
pub struct SqliteSink {
    options: SinkOptions,
    ingest: BatchWriterHandle,
    metrics: Arc<SinkMetrics>,
    state: AtomicU8,
    workers: Mutex<Option<Workers>>,
}

impl SqliteSink {
    /// Opens the store, ensures the schema and starts both workers.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the options do not validate
    /// - `Error::Io` if the store directory cannot be created or a worker
    ///   thread cannot be started
    /// - `Error::Sqlite` / `Error::Schema` if the store cannot be opened or
    ///   the schema cannot be created
    pub fn open(options: SinkOptions) -> Result<Self> {
        options.validate()?;

        let database = if options.is_in_memory() {
            Database::open_in_memory(options.journal_mode)?
        } else {
            if let Some(parent) = options.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Database::open(&options.path, options.journal_mode)?
        };

        let (ingest, ingest_rx) = ingest_channel(options.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(SinkMetrics::new());
        let lock = Arc::new(WriteLock::new(database.into_connection()));

        let writer = BatchWriter::new(
            options.batch_max_size,
            options.track_message_template,
            Arc::clone(&metrics),
        );
        let writer_handle = spawn_batch_writer(
            writer,
            ingest_rx,
            Arc::clone(&lock),
            shutdown_rx.clone(),
        )?;

        let purger_handle = match spawn_purger(
            Arc::clone(&lock),
            options.retention,
            options.purge_interval,
            Arc::clone(&metrics),
            shutdown_rx,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                // Stop the writer before reporting; it holds a clone of the lock.
                let _ = shutdown_tx.send(true);
                let _ = writer_handle.join();
                return Err(e);
            }
        };

        tracing::info!(
            target: SELFLOG_TARGET,
            path = %options.path.display(),
            journal_mode = %options.journal_mode,
            retention = %humantime::format_duration(options.retention),
            "sqlite log sink opened"
        );

        Ok(Self {
            options,
            ingest,
            metrics,
            state: AtomicU8::new(SinkState::Running as u8),
            workers: Mutex::new(Some(Workers {
                writer: writer_handle,
                purger: purger_handle,
                shutdown_tx,
                lock,
            })),
        })
    }

    /// Offers a record to the ingestion channel.
    ///
    /// Never blocks. Returns `false` if the channel is full or the sink has
    /// been shut down; the record is discarded silently.
    pub fn emit(&self, record: LogRecord) -> bool {
        if self.state() != SinkState::Running {
            self.metrics.record_dropped();
            return false;
        }

        if self.ingest.try_submit(record) {
            self.metrics.record_accepted();
            true
        } else {
            self.metrics.record_dropped();
            false
        }
    }

    /// Stops accepting records, drains the channel and releases the store.
    ///
    /// Blocks until both workers have exited. The workers mutex stays held
    /// until the store is released, so a concurrent call waits for `Stopped`
    /// and a later call is a no-op.
    pub fn shutdown(&self) {
        let mut slot = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(workers) = slot.take() else {
            return;
        };

        self.set_state(SinkState::Draining);
        tracing::info!(
            target: SELFLOG_TARGET,
            queued = self.ingest.queued(),
            "sqlite log sink draining"
        );

        let _ = workers.shutdown_tx.send(true);

        if workers.writer.join().is_err() {
            tracing::error!(target: SELFLOG_TARGET, "batch writer thread panicked");
        }
        if workers.purger.join().is_err() {
            tracing::error!(target: SELFLOG_TARGET, "retention purger thread panicked");
        }

        self.release_store(workers.lock);
        self.set_state(SinkState::Stopped);

        let snap = self.metrics.snapshot();
        tracing::info!(
            target: SELFLOG_TARGET,
            written = snap.written,
            dropped = snap.dropped,
            lost = snap.lost,
            "sqlite log sink stopped"
        );
    }

    fn release_store(&self, lock: Arc<WriteLock>) {
        let conn = match Arc::try_unwrap(lock) {
            Ok(lock) => lock.into_inner(),
            Err(_) => {
                tracing::error!(
                    target: SELFLOG_TARGET,
                    "store connection still shared after workers stopped; leaving it to drop"
                );
                return;
            }
        };

        if self.options.journal_mode.is_wal() && !self.options.is_in_memory() {
            if let Err(e) = apply_journal_mode(&conn, JournalMode::Delete) {
                tracing::error!(
                    target: SELFLOG_TARGET,
                    error = %e,
                    "failed to switch journal mode to delete on shutdown"
                );
            }
        }

        if let Err((_conn, e)) = conn.close() {
            tracing::error!(target: SELFLOG_TARGET, error = %e, "failed to close log store");
        }
    }

    fn set_state(&self, state: SinkState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Records waiting in the ingestion channel.
    pub fn queue_len(&self) -> usize {
        self.ingest.queued()
    }

    /// The options the sink was opened with.
    pub fn options(&self) -> &SinkOptions {
        &self.options
    }
}

impl LogEventSink for SqliteSink {
    fn emit(&self, record: LogRecord) -> bool {
        SqliteSink::emit(self, record)
    }

    fn dispose(&self) {
        self.shutdown();
    }
}

impl Drop for SqliteSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================
