//! Counters maintained by the sink and its workers.
//!
//! All counters are monotonic and updated with relaxed atomics; a
//! [`MetricsSnapshot`] is a point-in-time copy, not a consistent cut.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between the sink and its workers.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    accepted: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    lost: AtomicU64,
    batches_committed: AtomicU64,
    batches_failed: AtomicU64,
    rows_purged: AtomicU64,
    purges_failed: AtomicU64,
}

/// A copy of [`SinkMetrics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records taken by the ingestion channel.
    pub accepted: u64,
    /// Records refused because the channel was full or the sink was shut down.
    pub dropped: u64,
    /// Records committed to the store.
    pub written: u64,
    /// Accepted records discarded with a failed batch.
    pub lost: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub rows_purged: u64,
    pub purges_failed: u64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_committed(&self, rows: usize) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.written.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_batch_failed(&self, rows: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.lost.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_purge(&self, rows: usize) {
        self.rows_purged.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_purge_failed(&self) {
        self.purges_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            rows_purged: self.rows_purged.load(Ordering::Relaxed),
            purges_failed: self.purges_failed.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Accepted records not yet written or lost.
    pub fn in_flight(&self) -> u64 {
        self.accepted.saturating_sub(self.written + self.lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let metrics = SinkMetrics::new();
        for _ in 0..5 {
            metrics.record_accepted();
        }
        metrics.record_dropped();
        metrics.record_batch_committed(3);
        metrics.record_batch_failed(1);
        metrics.record_purge(7);
        metrics.record_purge_failed();

        let snap = metrics.snapshot();
        assert_eq!(snap.accepted, 5);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.written, 3);
        assert_eq!(snap.lost, 1);
        assert_eq!(snap.batches_committed, 1);
        assert_eq!(snap.batches_failed, 1);
        assert_eq!(snap.rows_purged, 7);
        assert_eq!(snap.purges_failed, 1);
        assert_eq!(snap.in_flight(), 1);
    }
}
