//! # Retention Purger
//!
//! Deletes rows older than the retention horizon. The first purge runs as
//! soon as the sink starts, then one per `purge_interval` until shutdown.
//!
//! Each purge is one `DELETE ... WHERE Timestamp < cutoff` executed under the
//! write lock, so it never interleaves with a batch transaction. Because the
//! timestamp text is fixed width, the comparison is served by
//! `IX_Logs_Timestamp`.
//!
//! A failed purge is logged and counted, and the next cycle tries again.
//! Shutdown interrupts the wait between cycles; a purge already running is
//! allowed to finish.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::codec::format_timestamp;
use crate::error::{Error, Result};
use crate::lock::WriteLock;
use crate::metrics::SinkMetrics;
use crate::schema::DELETE_OLDER_THAN;
use crate::SELFLOG_TARGET;

/// Name of the purger thread.
pub const PURGER_THREAD_NAME: &str = "sqlite-sink-purger";

/// The retention cutoff for `retention` measured back from now, formatted
/// like the `Timestamp` column.
pub fn retention_cutoff(retention: Duration) -> Result<String> {
    let retention = chrono::Duration::from_std(retention)
        .map_err(|e| Error::Config(format!("retention out of range: {e}")))?;
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .ok_or_else(|| Error::Config("retention reaches before the earliest timestamp".to_string()))?;
    Ok(format_timestamp(cutoff))
}

/// Runs one purge. Returns the number of rows deleted.
pub async fn purge_once(lock: &WriteLock, retention: Duration) -> Result<usize> {
    let cutoff = retention_cutoff(retention)?;
    let conn = lock.acquire().await;
    let deleted = conn.execute(DELETE_OLDER_THAN, [&cutoff])?;
    Ok(deleted)
}

/// Runs purge cycles until `shutdown` flips to true or its sender is dropped.
pub async fn run_purger(
    lock: Arc<WriteLock>,
    retention: Duration,
    interval: Duration,
    metrics: Arc<SinkMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match purge_once(&lock, retention).await {
            Ok(0) => {}
            Ok(deleted) => {
                metrics.record_purge(deleted);
                tracing::debug!(target: SELFLOG_TARGET, deleted, "purged expired log rows");
            }
            Err(e) => {
                metrics.record_purge_failed();
                tracing::error!(target: SELFLOG_TARGET, error = %e, "failed to purge expired log rows");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(target: SELFLOG_TARGET, "retention purger stopped");
}

/// Spawns the purger loop on a dedicated thread with its own runtime.
pub fn spawn_purger(
    lock: Arc<WriteLock>,
    retention: Duration,
    interval: Duration,
    metrics: Arc<SinkMetrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let handle = std::thread::Builder::new()
        .name(PURGER_THREAD_NAME.to_string())
        .spawn(move || {
            rt.block_on(run_purger(lock, retention, interval, metrics, shutdown));
        })?;

    Ok(handle)
}
