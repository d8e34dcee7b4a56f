//! Store traits.
//!
//! Services are written against these traits rather than against `SQLite`
//! directly. [`UnitOfWork`](super::UnitOfWork) implements both, so every
//! call made through one value shares the same transaction.

use crate::models::{ApplicationStatus, CommunicationLog, Student, StudentId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Restricts an active-cohort count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortFilter<'a> {
    /// Every active student.
    All,
    /// Active students at the given funnel stage.
    Status(ApplicationStatus),
    /// Active students carrying the exact tag.
    Tag(&'a str),
}

impl CohortFilter<'_> {
    /// Evaluates the filter against a loaded student.
    ///
    /// Agrees with the SQL predicate used by [`StudentStore::count_active`].
    #[must_use]
    pub fn matches(&self, student: &Student) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => student.application_status == *status,
            Self::Tag(tag) => crate::models::has_tag(student, tag),
        }
    }
}

/// Student persistence.
pub trait StudentStore {
    /// Inserts a new student.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the email is already registered.
    fn insert_student(&self, student: &Student) -> Result<()>;

    /// Loads a student by id.
    fn get_student(&self, id: &StudentId) -> Result<Option<Student>>;

    /// Lists all students ordered by creation time, then id.
    fn list_students(&self) -> Result<Vec<Student>>;

    /// Overwrites a stored student. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the new email belongs to another student.
    fn update_student(&self, student: &Student) -> Result<bool>;

    /// Counts students active at or after `since` that match `filter`.
    fn count_active(&self, since: DateTime<Utc>, filter: CohortFilter<'_>) -> Result<u64>;

    /// Loads a student, failing with [`Error::NotFound`] if absent.
    fn require_student(&self, id: &StudentId) -> Result<Student> {
        self.get_student(id)?
            .ok_or_else(|| Error::student_not_found(id))
    }
}

/// Communication log persistence.
pub trait CommunicationStore {
    /// Appends a log entry.
    fn insert_log(&self, log: &CommunicationLog) -> Result<()>;

    /// Returns a student's logs newest first, entries without a timestamp
    /// last. `None` returns the whole history.
    fn recent_logs(
        &self,
        student_id: &StudentId,
        limit: Option<usize>,
    ) -> Result<Vec<CommunicationLog>>;
}
