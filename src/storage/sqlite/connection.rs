//! Shared connection handling for the `SQLite` database.
//!
//! Provides mutex acquisition with poison recovery and the pragma setup
//! applied to every connection.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default time a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Helper to acquire mutex lock with poison recovery.
///
/// A panic inside a unit of work poisons the mutex, but the transaction was
/// already rolled back when it unwound, so the connection itself is clean.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for concurrent use.
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: durability/performance balance
/// - **`busy_timeout`**: waits up to `busy_timeout` for locks
/// - **`foreign_keys`**: enforces `communication_logs.student_id`
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the busy timeout or foreign key
/// pragma cannot be applied.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    // journal_mode returns a row ("wal" or "memory"); ignore it
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");

    conn.busy_timeout(busy_timeout)
        .map_err(|e| Error::OperationFailed {
            operation: "configure_busy_timeout".to_string(),
            cause: e.to_string(),
        })?;

    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::OperationFailed {
            operation: "configure_foreign_keys".to_string(),
            cause: e.to_string(),
        })?;

    Ok(())
}
