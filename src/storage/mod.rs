//! Storage layer.
//!
//! A single `SQLite` database holds students and their communication logs.
//! [`Database`] owns the connection; all access goes through a
//! [`UnitOfWork`], a transaction that commits when the closure returns `Ok`
//! and rolls back otherwise (including on unwind, when the underlying
//! `rusqlite::Transaction` is dropped).

// Dropping the connection guard early gains nothing.
#![allow(clippy::significant_drop_tightening)]

pub mod migrations;
pub mod sqlite;
mod traits;

pub use migrations::{MIGRATIONS, Migration, MigrationRunner};
pub use traits::{CohortFilter, CommunicationStore, StudentStore};

use crate::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use sqlite::{acquire_lock, configure_connection, query_error, record_operation_metrics};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Handle to the CRM database.
///
/// # Concurrency Model
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// `Mutex` and one unit of work runs at a time. WAL mode lets external
/// readers proceed, and `busy_timeout` bounds how long a statement waits on
/// a lock held by another process.
pub struct Database {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl Database {
    /// Opens (or creates) a file-backed database and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or migrations fail.
    pub fn open(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_database_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(|e| query_error("open_sqlite", &e))?;
        Self::initialize(conn, Some(db_path), busy_timeout)
    }

    /// Opens an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| query_error("open_sqlite_in_memory", &e))?;
        Self::initialize(conn, None, sqlite::DEFAULT_BUSY_TIMEOUT)
    }

    fn initialize(
        mut conn: Connection,
        db_path: Option<PathBuf>,
        busy_timeout: Duration,
    ) -> Result<Self> {
        configure_connection(&conn, busy_timeout)?;
        let version = MigrationRunner::new(MIGRATIONS).run(&mut conn)?;
        tracing::debug!(
            schema_version = version,
            path = ?db_path,
            "Database ready"
        );
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Returns the applied schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the migrations table cannot be read.
    pub fn schema_version(&self) -> Result<i64> {
        let conn = acquire_lock(&self.conn);
        MigrationRunner::current_version(&conn)
    }

    /// Runs `f` in a write transaction.
    ///
    /// The write lock is taken up front (`BEGIN IMMEDIATE`), so a unit of
    /// work never fails halfway through on a lock upgrade.
    ///
    /// # Errors
    ///
    /// Returns the closure's error (after rolling back) or a failure to
    /// begin or commit.
    #[instrument(skip(self, f), fields(backend = "sqlite"))]
    pub fn unit_of_work<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T>,
    {
        self.run(operation, TransactionBehavior::Immediate, f)
    }

    /// Runs `f` in a read transaction, giving it one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or a failure to begin the transaction.
    #[instrument(skip(self, f), fields(backend = "sqlite"))]
    pub fn read<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T>,
    {
        self.run(operation, TransactionBehavior::Deferred, f)
    }

    fn run<T, F>(&self, operation: &'static str, behavior: TransactionBehavior, f: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T>,
    {
        let start = Instant::now();
        let result = (|| {
            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction_with_behavior(behavior)
                .map_err(|e| query_error("begin_transaction", &e))?;
            let uow = UnitOfWork { tx };

            match f(&uow) {
                Ok(value) => {
                    uow.tx
                        .commit()
                        .map_err(|e| query_error("commit_transaction", &e))?;
                    Ok(value)
                },
                Err(e) => {
                    if let Err(rollback) = uow.tx.rollback() {
                        tracing::warn!(error = %rollback, "Rollback failed");
                    }
                    Err(e)
                },
            }
        })();

        if let Err(e) = &result {
            tracing::debug!(operation, error = %e, "Unit of work failed");
        }
        record_operation_metrics(operation, start, &result);
        result
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

/// One transaction against the database.
///
/// Implements [`StudentStore`] and [`CommunicationStore`]; obtained only
/// through [`Database::unit_of_work`] or [`Database::read`].
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    pub(crate) fn conn(&self) -> &Connection {
        &self.tx
    }
}
