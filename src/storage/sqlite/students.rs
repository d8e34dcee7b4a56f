//! [`StudentStore`] for `SQLite`.

use super::{STUDENT_COLUMNS, StudentRow, encode_tags, query_error, to_micros};
use crate::models::{Student, StudentId};
use crate::storage::{CohortFilter, StudentStore, UnitOfWork};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::instrument;

const DUPLICATE_EMAIL: &str = "A student with this email already exists";

/// Active-cohort predicate shared by every count.
const ACTIVE_WHERE: &str = "last_active IS NOT NULL AND last_active >= ?1";

impl StudentStore for UnitOfWork<'_> {
    #[instrument(skip(self, student), fields(student.id = %student.id))]
    fn insert_student(&self, student: &Student) -> Result<()> {
        let tags = encode_tags(&student.tags)?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO students ({STUDENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    student.id.to_string(),
                    student.name,
                    student.email,
                    student.phone,
                    student.country,
                    student.application_status.as_str(),
                    student.last_active.as_ref().map(to_micros),
                    to_micros(&student.created_at),
                    to_micros(&student.updated_at),
                    tags,
                    student.internal_notes,
                ],
            )
            .map_err(|e| write_error("insert_student", &e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(student.id = %id))]
    fn get_student(&self, id: &StudentId) -> Result<Option<Student>> {
        self.conn()
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
                params![id.to_string()],
                StudentRow::from_row,
            )
            .optional()
            .map_err(|e| query_error("get_student", &e))?
            .map(StudentRow::into_student)
            .transpose()
    }

    #[instrument(skip(self))]
    fn list_students(&self) -> Result<Vec<Student>> {
        let mut stmt = self
            .conn()
            .prepare(&format!(
                "SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at, id"
            ))
            .map_err(|e| query_error("prepare_list_students", &e))?;
        let rows = stmt
            .query_map([], StudentRow::from_row)
            .map_err(|e| query_error("list_students", &e))?;

        rows.map(|row| {
            row.map_err(|e| query_error("read_student_row", &e))?
                .into_student()
        })
        .collect()
    }

    #[instrument(skip(self, student), fields(student.id = %student.id))]
    fn update_student(&self, student: &Student) -> Result<bool> {
        let tags = encode_tags(&student.tags)?;
        let changed = self
            .conn()
            .execute(
                "UPDATE students SET
                    name = ?2, email = ?3, phone = ?4, country = ?5,
                    application_status = ?6, last_active = ?7, updated_at = ?8,
                    tags = ?9, internal_notes = ?10
                 WHERE id = ?1",
                params![
                    student.id.to_string(),
                    student.name,
                    student.email,
                    student.phone,
                    student.country,
                    student.application_status.as_str(),
                    student.last_active.as_ref().map(to_micros),
                    to_micros(&student.updated_at),
                    tags,
                    student.internal_notes,
                ],
            )
            .map_err(|e| write_error("update_student", &e))?;
        Ok(changed > 0)
    }

    #[instrument(skip(self), fields(since = %since))]
    fn count_active(&self, since: DateTime<Utc>, filter: CohortFilter<'_>) -> Result<u64> {
        let since = to_micros(&since);
        let n: i64 = match filter {
            CohortFilter::All => self.conn().query_row(
                &format!("SELECT COUNT(*) FROM students WHERE {ACTIVE_WHERE}"),
                params![since],
                |row| row.get(0),
            ),
            CohortFilter::Status(status) => self.conn().query_row(
                &format!(
                    "SELECT COUNT(*) FROM students
                     WHERE {ACTIVE_WHERE} AND application_status = ?2"
                ),
                params![since, status.as_str()],
                |row| row.get(0),
            ),
            CohortFilter::Tag(tag) => self.conn().query_row(
                &format!(
                    "SELECT COUNT(*) FROM students
                     WHERE {ACTIVE_WHERE}
                       AND EXISTS (SELECT 1 FROM json_each(students.tags) WHERE value = ?2)"
                ),
                params![since, tag],
                |row| row.get(0),
            ),
        }
        .map_err(|e| query_error("count_active", &e))?;

        u64::try_from(n).map_err(|e| Error::OperationFailed {
            operation: "count_active".to_string(),
            cause: e.to_string(),
        })
    }
}

fn write_error(operation: &str, e: &rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(err, _) = e
        && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    {
        return Error::InvalidInput(DUPLICATE_EMAIL.to_string());
    }
    query_error(operation, e)
}

#[cfg(test)]
mod tests {
    use crate::models::{ApplicationStatus, Student, StudentId, TagSet, tags, timestamp};
    use crate::storage::{CohortFilter, Database, StudentStore};
    use crate::Error;
    use chrono::{DateTime, Duration, Utc};

    fn student(email: &str, last_active: Option<DateTime<Utc>>, tags: &[&str]) -> Student {
        let now = timestamp::now();
        Student {
            id: StudentId::generate(),
            name: "Test Student".to_string(),
            email: email.to_string(),
            phone: Some("+44 20 7946 0000".to_string()),
            country: Some("UK".to_string()),
            application_status: ApplicationStatus::Exploring,
            last_active,
            created_at: now,
            updated_at: now,
            tags: tags.iter().copied().collect::<TagSet>(),
            internal_notes: None,
        }
    }

    #[test]
    fn test_insert_and_get_preserves_fields() {
        let db = Database::in_memory().unwrap();
        let mut s = student("a@uni.edu", Some(timestamp::now()), &[tags::HIGH_INTENT, "custom"]);
        s.internal_notes = Some("Prefers SMS".to_string());
        db.unit_of_work("insert", |uow| uow.insert_student(&s)).unwrap();

        let loaded = db.read("get", |uow| uow.require_student(&s.id)).unwrap();
        assert_eq!(loaded, s);
        assert_eq!(
            loaded.tags.iter().collect::<Vec<_>>(),
            vec![tags::HIGH_INTENT, "custom"]
        );
    }

    #[test]
    fn test_require_missing_student() {
        let db = Database::in_memory().unwrap();
        let err = db
            .read("get", |uow| uow.require_student(&StudentId::generate()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_duplicate_email_is_invalid_input() {
        let db = Database::in_memory().unwrap();
        let first = student("dup@uni.edu", None, &[]);
        let second = student("dup@uni.edu", None, &[]);
        db.unit_of_work("insert", |uow| uow.insert_student(&first)).unwrap();

        let err = db
            .unit_of_work("insert", |uow| uow.insert_student(&second))
            .unwrap_err();
        match err {
            Error::InvalidInput(msg) => {
                assert_eq!(msg, "A student with this email already exists");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_update_to_taken_email_is_rejected() {
        let db = Database::in_memory().unwrap();
        let a = student("a@uni.edu", None, &[]);
        let mut b = student("b@uni.edu", None, &[]);
        db.unit_of_work("insert", |uow| {
            uow.insert_student(&a)?;
            uow.insert_student(&b)
        })
        .unwrap();

        b.email = "a@uni.edu".to_string();
        let err = db
            .unit_of_work("update", |uow| uow.update_student(&b))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_update_missing_returns_false() {
        let db = Database::in_memory().unwrap();
        let ghost = student("ghost@uni.edu", None, &[]);
        assert!(!db.unit_of_work("update", |uow| uow.update_student(&ghost)).unwrap());
    }

    #[test]
    fn test_list_orders_by_creation() {
        let db = Database::in_memory().unwrap();
        let mut older = student("older@uni.edu", None, &[]);
        older.created_at -= Duration::days(2);
        let newer = student("newer@uni.edu", None, &[]);
        db.unit_of_work("insert", |uow| {
            uow.insert_student(&newer)?;
            uow.insert_student(&older)
        })
        .unwrap();

        let listed = db.read("list", |uow| uow.list_students()).unwrap();
        let emails: Vec<_> = listed.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["older@uni.edu", "newer@uni.edu"]);
    }

    #[test]
    fn test_count_active_agrees_with_in_memory_filter() {
        let db = Database::in_memory().unwrap();
        let now = timestamp::now();
        let since = now - Duration::days(180);
        let mut applying = student("a@uni.edu", Some(now), &[tags::NEEDS_ESSAY_HELP]);
        applying.application_status = ApplicationStatus::Applying;
        let students = vec![
            applying,
            student("b@uni.edu", Some(now - Duration::days(10)), &[tags::HIGH_INTENT]),
            student("c@uni.edu", Some(now - Duration::days(200)), &[tags::HIGH_INTENT]),
            student("d@uni.edu", None, &[tags::NOT_CONTACTED]),
            student("e@uni.edu", Some(now), &["high intent"]),
        ];
        db.unit_of_work("insert", |uow| {
            students.iter().try_for_each(|s| uow.insert_student(s))
        })
        .unwrap();

        let filters = [
            CohortFilter::All,
            CohortFilter::Status(ApplicationStatus::Applying),
            CohortFilter::Tag(tags::HIGH_INTENT),
            CohortFilter::Tag(tags::NEEDS_ESSAY_HELP),
            CohortFilter::Tag(tags::NOT_CONTACTED),
        ];
        for filter in filters {
            let sql = db.read("count", |uow| uow.count_active(since, filter)).unwrap();
            let expected = students
                .iter()
                .filter(|s| s.last_active.is_some_and(|t| t >= since))
                .filter(|s| filter.matches(s))
                .count() as u64;
            assert_eq!(sql, expected, "filter {filter:?}");
        }
    }
}
