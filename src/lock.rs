//! # Write Lock
//!
//! The single connection to the store, behind an async mutex. The batch
//! writer and the retention purger both write; each acquires the lock for the
//! span of one transaction, so their transactions never overlap.
//!
//! Waiters are served in FIFO order (tokio's mutex is fair), so neither
//! worker can starve the other. The guard releases the lock on drop, on every
//! path, including an early return from a failed transaction.

use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};

/// Exclusive access to the store connection.
#[derive(Debug)]
pub struct WriteLock {
    conn: Mutex<Connection>,
}

impl WriteLock {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Waits for exclusive access.
    pub async fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Takes exclusive access without waiting, if free.
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, Connection>> {
        self.conn.try_lock().ok()
    }

    /// Returns the connection once no worker holds a reference.
    pub fn into_inner(self) -> Connection {
        self.conn.into_inner()
    }
}
