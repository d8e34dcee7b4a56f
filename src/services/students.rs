//! Student operations behind the request surface.
//!
//! Each operation runs in exactly one unit of work. Validation and the
//! existence check happen before any write, so a rejected request leaves
//! the database untouched.

use crate::models::{
    CommunicationLog, EMAIL, FOLLOW_UP_EMAIL_CONTENT, FollowUpReceipt, NewCommunication,
    NewStudent, NotesUpdate, Student, StudentId, StudentUpdate, TagsUpdate, timestamp,
};
use crate::storage::{CommunicationStore, Database, StudentStore};
use crate::{Error, Result};
use tracing::instrument;

/// Logs shown by `GET /students/{id}/communications` when no limit is given.
pub const DEFAULT_COMMUNICATIONS_LIMIT: usize = 3;

/// Largest accepted communications `limit`.
pub const MAX_COMMUNICATIONS_LIMIT: usize = 100;

/// Logs handed to the summary generator.
pub const SUMMARY_LOG_LIMIT: usize = 10;

/// Student CRUD and communication history.
#[derive(Debug, Clone, Copy)]
pub struct StudentService<'a> {
    db: &'a Database,
}

impl<'a> StudentService<'a> {
    /// Creates a service over `db`.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Creates a student.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name, malformed email, or
    /// an email that is already registered.
    #[instrument(skip(self, new))]
    pub fn create(&self, new: NewStudent) -> Result<Student> {
        new.validate()?;
        let student = Student::from_new(new, timestamp::now());
        self.db
            .unit_of_work("create_student", |uow| uow.insert_student(&student))?;
        tracing::info!(student.id = %student.id, "Created student");
        Ok(student)
    }

    /// Lists all students.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self) -> Result<Vec<Student>> {
        self.db.read("list_students", |uow| uow.list_students())
    }

    /// Loads one student.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student does not exist.
    pub fn get(&self, id: &StudentId) -> Result<Student> {
        self.db.read("get_student", |uow| uow.require_student(id))
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for invalid fields and
    /// [`Error::NotFound`] if the student does not exist.
    #[instrument(skip(self, update), fields(student.id = %id))]
    pub fn update(&self, id: &StudentId, update: StudentUpdate) -> Result<Student> {
        update.validate()?;
        self.modify("update_student", id, |student| {
            student.apply(update, timestamp::now());
        })
    }

    /// Replaces the internal notes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student does not exist.
    #[instrument(skip(self, notes), fields(student.id = %id))]
    pub fn replace_notes(&self, id: &StudentId, notes: NotesUpdate) -> Result<Student> {
        self.modify("replace_internal_notes", id, |student| {
            student.internal_notes = notes.internal_notes;
            student.touch(timestamp::now());
        })
    }

    /// Replaces the whole tag set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student does not exist.
    #[instrument(skip(self, tags), fields(student.id = %id))]
    pub fn replace_tags(&self, id: &StudentId, tags: TagsUpdate) -> Result<Student> {
        self.modify("replace_tags", id, |student| {
            student.tags = tags.tags;
            student.touch(timestamp::now());
        })
    }

    fn modify<F>(&self, operation: &'static str, id: &StudentId, change: F) -> Result<Student>
    where
        F: FnOnce(&mut Student),
    {
        self.db.unit_of_work(operation, |uow| {
            let mut student = uow.require_student(id)?;
            change(&mut student);
            if !uow.update_student(&student)? {
                return Err(Error::student_not_found(id));
            }
            Ok(student)
        })
    }

    /// Records a (mocked) follow-up email.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student does not exist.
    #[instrument(skip(self), fields(student.id = %id))]
    pub fn send_follow_up_email(&self, id: &StudentId) -> Result<FollowUpReceipt> {
        let email = self.db.unit_of_work("send_follow_up_email", |uow| {
            let student = uow.require_student(id)?;
            let log = CommunicationLog::new(
                student.id,
                EMAIL,
                Some(FOLLOW_UP_EMAIL_CONTENT.to_string()),
                timestamp::now(),
            );
            uow.insert_log(&log)?;
            Ok(student.email)
        })?;
        tracing::info!("Follow-up email logged");
        Ok(FollowUpReceipt {
            message: format!("Follow-up email sent to {email}"),
        })
    }

    /// Appends a communication log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank type and
    /// [`Error::NotFound`] if the student does not exist.
    #[instrument(skip(self, entry), fields(student.id = %id))]
    pub fn log_communication(
        &self,
        id: &StudentId,
        entry: NewCommunication,
    ) -> Result<CommunicationLog> {
        entry.validate()?;
        self.db.unit_of_work("log_communication", |uow| {
            let student = uow.require_student(id)?;
            let log = CommunicationLog::new(student.id, entry.kind, entry.content, timestamp::now());
            uow.insert_log(&log)?;
            Ok(log)
        })
    }

    /// Returns the newest `limit` logs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `limit` is outside
    /// `1..=MAX_COMMUNICATIONS_LIMIT` and [`Error::NotFound`] if the student
    /// does not exist.
    pub fn recent_communications(
        &self,
        id: &StudentId,
        limit: usize,
    ) -> Result<Vec<CommunicationLog>> {
        if !(1..=MAX_COMMUNICATIONS_LIMIT).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {MAX_COMMUNICATIONS_LIMIT}"
            )));
        }
        self.db.read("recent_communications", |uow| {
            uow.require_student(id)?;
            uow.recent_logs(id, Some(limit))
        })
    }

    /// Loads a student with up to `limit` newest logs (`None` for all).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student does not exist.
    pub fn with_history(
        &self,
        id: &StudentId,
        limit: Option<usize>,
    ) -> Result<(Student, Vec<CommunicationLog>)> {
        self.db.read("student_with_history", |uow| {
            let student = uow.require_student(id)?;
            let logs = uow.recent_logs(id, limit)?;
            Ok((student, logs))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, SMS, tags};

    fn new_student(email: &str) -> NewStudent {
        serde_json::from_value(serde_json::json!({
            "name": "Jordan Park",
            "email": email,
            "country": "Korea",
            "application_status": "Exploring",
            "tags": [tags::HIGH_INTENT],
        }))
        .unwrap()
    }

    #[test]
    fn test_create_then_get_round_trip() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let created = service.create(new_student("jordan@uni.edu")).unwrap();
        let fetched = service.get(&created.id).unwrap();
        assert_eq!(created, fetched);
        assert!(fetched.tags.contains(tags::HIGH_INTENT));
    }

    #[test]
    fn test_submitted_fields_stored_verbatim() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let mut new = new_student(" ana@uni.edu ");
        new.name = "  Ana Lee ".to_string();
        let created = service.create(new).unwrap();
        let fetched = service.get(&created.id).unwrap();
        assert_eq!(fetched.name, "  Ana Lee ");
        assert_eq!(fetched.email, " ana@uni.edu ");
        assert_eq!(fetched.country.as_deref(), Some("Korea"));

        let update: StudentUpdate = serde_json::from_value(serde_json::json!({
            "name": " Ana  Lee\t",
            "email": "\tana.lee@uni.edu ",
        }))
        .unwrap();
        service.update(&created.id, update).unwrap();
        let fetched = service.get(&created.id).unwrap();
        assert_eq!(fetched.name, " Ana  Lee\t");
        assert_eq!(fetched.email, "\tana.lee@uni.edu ");
    }

    #[test]
    fn test_create_rejects_bad_email_without_writing() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let err = service.create(new_student("not-an-email")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_partial_update_touches_only_given_fields() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let created = service.create(new_student("jordan@uni.edu")).unwrap();

        let update: StudentUpdate = serde_json::from_value(serde_json::json!({
            "application_status": "Applying",
            "phone": "+82 2 0000 0000",
        }))
        .unwrap();
        let updated = service.update(&created.id, update).unwrap();

        assert_eq!(updated.application_status, ApplicationStatus::Applying);
        assert_eq!(updated.phone.as_deref(), Some("+82 2 0000 0000"));
        assert_eq!(updated.country, created.country);
        assert_eq!(updated.tags, created.tags);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(service.get(&created.id).unwrap(), updated);
    }

    #[test]
    fn test_replace_tags_replaces_whole_set() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let created = service.create(new_student("jordan@uni.edu")).unwrap();

        let tags: TagsUpdate =
            serde_json::from_value(serde_json::json!({ "tags": ["X", "Y"] })).unwrap();
        let updated = service.replace_tags(&created.id, tags).unwrap();
        assert_eq!(updated.tags.iter().collect::<Vec<_>>(), vec!["X", "Y"]);
        assert!(!updated.tags.contains(tags::HIGH_INTENT));
    }

    #[test]
    fn test_replace_notes_can_clear() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let created = service.create(new_student("jordan@uni.edu")).unwrap();
        let set = NotesUpdate {
            internal_notes: Some("Call back Friday".to_string()),
        };
        assert_eq!(
            service
                .replace_notes(&created.id, set)
                .unwrap()
                .internal_notes
                .as_deref(),
            Some("Call back Friday")
        );
        let cleared = service
            .replace_notes(&created.id, NotesUpdate::default())
            .unwrap();
        assert_eq!(cleared.internal_notes, None);
    }

    #[test]
    fn test_operations_on_missing_student() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let ghost = StudentId::generate();
        assert!(matches!(service.get(&ghost), Err(Error::NotFound { .. })));
        assert!(matches!(
            service.send_follow_up_email(&ghost),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            service.recent_communications(&ghost, 3),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_follow_up_email_logs_entry() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let created = service.create(new_student("jordan@uni.edu")).unwrap();

        let receipt = service.send_follow_up_email(&created.id).unwrap();
        assert_eq!(receipt.message, "Follow-up email sent to jordan@uni.edu");

        let logs = service.recent_communications(&created.id, 3).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, EMAIL);
        assert_eq!(logs[0].content.as_deref(), Some(FOLLOW_UP_EMAIL_CONTENT));
    }

    #[test]
    fn test_limit_bounds() {
        let db = Database::in_memory().unwrap();
        let service = StudentService::new(&db);
        let created = service.create(new_student("jordan@uni.edu")).unwrap();
        for _ in 0..2 {
            service
                .log_communication(
                    &created.id,
                    NewCommunication {
                        kind: SMS.to_string(),
                        content: None,
                    },
                )
                .unwrap();
        }
        assert!(service.recent_communications(&created.id, 0).is_err());
        assert!(service.recent_communications(&created.id, 101).is_err());
        assert_eq!(
            service
                .recent_communications(&created.id, 100)
                .unwrap()
                .len(),
            2
        );
    }
}
