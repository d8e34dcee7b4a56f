//! [`CommunicationStore`] for `SQLite`.

use super::{LOG_COLUMNS, LogRow, query_error, to_micros};
use crate::Result;
use crate::models::{CommunicationLog, StudentId};
use crate::storage::{CommunicationStore, UnitOfWork};
use rusqlite::params;
use tracing::instrument;

impl CommunicationStore for UnitOfWork<'_> {
    #[instrument(skip(self, log), fields(student.id = %log.student_id, log.kind = %log.kind))]
    fn insert_log(&self, log: &CommunicationLog) -> Result<()> {
        self.conn()
            .execute(
                &format!("INSERT INTO communication_logs ({LOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    log.id.to_string(),
                    log.student_id.to_string(),
                    log.kind,
                    log.content,
                    log.timestamp.as_ref().map(to_micros),
                ],
            )
            .map_err(|e| query_error("insert_log", &e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(student.id = %student_id))]
    fn recent_logs(
        &self,
        student_id: &StudentId,
        limit: Option<usize>,
    ) -> Result<Vec<CommunicationLog>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt = self
            .conn()
            .prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM communication_logs
                 WHERE student_id = ?1
                 ORDER BY timestamp IS NULL, timestamp DESC, rowid DESC
                 LIMIT ?2"
            ))
            .map_err(|e| query_error("prepare_recent_logs", &e))?;
        let rows = stmt
            .query_map(params![student_id.to_string(), limit], LogRow::from_row)
            .map_err(|e| query_error("recent_logs", &e))?;

        rows.map(|row| row.map_err(|e| query_error("read_log_row", &e))?.into_log())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{
        ApplicationStatus, CommunicationLog, EMAIL, SMS, Student, StudentId, timestamp,
    };
    use crate::storage::{CommunicationStore, Database, StudentStore};
    use chrono::{Duration, Utc};

    fn seeded() -> (Database, StudentId) {
        let db = Database::in_memory().unwrap();
        let now = timestamp::now();
        let student = Student {
            id: StudentId::generate(),
            name: "Ana".to_string(),
            email: "ana@uni.edu".to_string(),
            phone: None,
            country: None,
            application_status: ApplicationStatus::Shortlisting,
            last_active: None,
            created_at: now,
            updated_at: now,
            tags: Default::default(),
            internal_notes: None,
        };
        db.unit_of_work("insert", |uow| uow.insert_student(&student))
            .unwrap();
        (db, student.id)
    }

    #[test]
    fn test_recent_logs_newest_first_with_limit() {
        let (db, id) = seeded();
        let base = Utc::now() - Duration::days(10);
        db.unit_of_work("insert_logs", |uow| {
            (0..5).try_for_each(|i| {
                let log = CommunicationLog::new(
                    id,
                    EMAIL,
                    Some(format!("message {i}")),
                    base + Duration::days(i),
                );
                uow.insert_log(&log)
            })
        })
        .unwrap();

        let logs = db.read("recent", |uow| uow.recent_logs(&id, Some(2))).unwrap();
        let contents: Vec<_> = logs.iter().filter_map(|l| l.content.as_deref()).collect();
        assert_eq!(contents, vec!["message 4", "message 3"]);

        let all = db.read("recent", |uow| uow.recent_logs(&id, None)).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_untimestamped_logs_sort_last() {
        let (db, id) = seeded();
        let mut undated = CommunicationLog::new(id, SMS, None, Utc::now());
        undated.timestamp = None;
        let dated = CommunicationLog::new(id, EMAIL, None, Utc::now() - Duration::days(30));
        db.unit_of_work("insert_logs", |uow| {
            uow.insert_log(&undated)?;
            uow.insert_log(&dated)
        })
        .unwrap();

        let logs = db.read("recent", |uow| uow.recent_logs(&id, None)).unwrap();
        assert_eq!(logs[0].id, dated.id);
        assert_eq!(logs[1], undated);
    }

    #[test]
    fn test_log_for_unknown_student_is_rejected() {
        let (db, _) = seeded();
        let orphan = CommunicationLog::new(StudentId::generate(), EMAIL, None, Utc::now());
        assert!(
            db.unit_of_work("insert_log", |uow| uow.insert_log(&orphan))
                .is_err()
        );
    }
}
