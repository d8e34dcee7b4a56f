//! Embedded schema migrations.
//!
//! Forward-only, versioned migrations applied when the database is opened.
//! Applied versions are tracked in `schema_migrations`; each migration runs
//! in its own transaction.

use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i64,
    /// Human-readable description.
    pub description: &'static str,
    /// SQL to apply (may contain multiple statements).
    pub sql: &'static str,
}

/// Schema history for the CRM database.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create students table",
        sql: "CREATE TABLE IF NOT EXISTS students (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT,
                country TEXT,
                application_status TEXT NOT NULL CHECK (
                    application_status IN ('Exploring', 'Shortlisting', 'Applying', 'Submitted')
                ),
                last_active INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]'
            );
            CREATE INDEX IF NOT EXISTS idx_students_last_active ON students(last_active);",
    },
    Migration {
        version: 2,
        description: "Add internal notes to students",
        sql: "ALTER TABLE students ADD COLUMN internal_notes TEXT;",
    },
    Migration {
        version: 3,
        description: "Create communication logs table",
        sql: "CREATE TABLE IF NOT EXISTS communication_logs (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL REFERENCES students(id),
                type TEXT NOT NULL,
                content TEXT,
                timestamp INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_communication_logs_student_time
                ON communication_logs(student_id, timestamp DESC);",
    },
];

/// Applies pending migrations to a connection.
pub struct MigrationRunner<'a> {
    migrations: &'a [Migration],
}

impl<'a> MigrationRunner<'a> {
    /// Creates a runner for the given migration list.
    #[must_use]
    pub const fn new(migrations: &'a [Migration]) -> Self {
        Self { migrations }
    }

    /// Runs all pending migrations and returns the resulting version.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails; that migration is rolled back
    /// and earlier ones stay applied.
    pub fn run(&self, conn: &mut Connection) -> Result<i64> {
        Self::ensure_migrations_table(conn)?;
        let mut version = Self::current_version(conn)?;

        for migration in self.migrations {
            if migration.version > version {
                Self::apply(conn, migration)?;
                version = migration.version;
            }
        }

        Ok(version)
    }

    /// Returns the highest applied version (0 for a fresh database).
    ///
    /// # Errors
    ///
    /// Returns an error if the tracking table cannot be queried.
    pub fn current_version(conn: &Connection) -> Result<i64> {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| migration_error("check_migrations_table", &e))?;
        if exists.is_none() {
            return Ok(0);
        }

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| migration_error("current_version", &e))
    }

    fn ensure_migrations_table(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(|e| migration_error("create_migrations_table", &e))?;
        Ok(())
    }

    fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
        let tx = conn
            .transaction()
            .map_err(|e| migration_error("begin_migration", &e))?;
        tx.execute_batch(migration.sql)
            .map_err(|e| migration_error(migration.description, &e))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.description],
        )
        .map_err(|e| migration_error("record_migration", &e))?;
        tx.commit()
            .map_err(|e| migration_error("commit_migration", &e))?;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "Applied schema migration"
        );
        Ok(())
    }
}

fn migration_error(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: format!("migration: {operation}"),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(MigrationRunner::current_version(&conn).unwrap(), 0);

        let version = MigrationRunner::new(MIGRATIONS).run(&mut conn).unwrap();
        assert_eq!(version, 3);

        let has_notes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('students') WHERE name = 'internal_notes'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_notes, 1);
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new(MIGRATIONS);
        runner.run(&mut conn).unwrap();
        assert_eq!(runner.run(&mut conn).unwrap(), 3);

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(applied, 3);
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let broken = [
            MIGRATIONS[0],
            Migration {
                version: 2,
                description: "Broken",
                sql: "CREATE TABLE extra (id TEXT); THIS IS NOT SQL;",
            },
        ];
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(MigrationRunner::new(&broken).run(&mut conn).is_err());
        assert_eq!(MigrationRunner::current_version(&conn).unwrap(), 1);

        let extra: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'extra'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(extra, 0);
    }
}
