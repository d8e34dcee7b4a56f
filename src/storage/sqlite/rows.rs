//! Row conversion between `SQLite` columns and model types.
//!
//! Timestamps are stored as microseconds since the Unix epoch so that range
//! comparisons stay numeric. Tags are stored as a JSON array, which lets
//! cohort queries test membership with `json_each`.

use crate::models::{ApplicationStatus, CommunicationLog, Student, StudentId, TagSet};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

/// Column list matching [`StudentRow::from_row`].
pub const STUDENT_COLUMNS: &str = "id, name, email, phone, country, application_status, \
     last_active, created_at, updated_at, tags, internal_notes";

/// Column list matching [`LogRow::from_row`].
pub const LOG_COLUMNS: &str = "id, student_id, type, content, timestamp";

/// Raw `students` row.
#[derive(Debug)]
pub struct StudentRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    country: Option<String>,
    application_status: String,
    last_active: Option<i64>,
    created_at: i64,
    updated_at: i64,
    tags: String,
    internal_notes: Option<String>,
}

impl StudentRow {
    /// Reads a row selected with [`STUDENT_COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            country: row.get(4)?,
            application_status: row.get(5)?,
            last_active: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            tags: row.get(9)?,
            internal_notes: row.get(10)?,
        })
    }

    /// Converts to a [`Student`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if a stored value cannot be decoded.
    pub fn into_student(self) -> Result<Student> {
        let application_status = ApplicationStatus::parse(&self.application_status)
            .ok_or_else(|| decode_error(format!("unknown status '{}'", self.application_status)))?;
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .map_err(|e| decode_error(format!("tags column: {e}")))?;

        Ok(Student {
            id: parse_uuid(&self.id)?.into(),
            name: self.name,
            email: self.email,
            phone: self.phone,
            country: self.country,
            application_status,
            last_active: self.last_active.map(from_micros).transpose()?,
            created_at: from_micros(self.created_at)?,
            updated_at: from_micros(self.updated_at)?,
            tags: TagSet::from(tags),
            internal_notes: self.internal_notes,
        })
    }
}

/// Raw `communication_logs` row.
#[derive(Debug)]
pub struct LogRow {
    id: String,
    student_id: String,
    kind: String,
    content: Option<String>,
    timestamp: Option<i64>,
}

impl LogRow {
    /// Reads a row selected with [`LOG_COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            kind: row.get(2)?,
            content: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }

    /// Converts to a [`CommunicationLog`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if a stored value cannot be decoded.
    pub fn into_log(self) -> Result<CommunicationLog> {
        Ok(CommunicationLog {
            id: parse_uuid(&self.id)?,
            student_id: StudentId::from(parse_uuid(&self.student_id)?),
            kind: self.kind,
            content: self.content,
            timestamp: self.timestamp.map(from_micros).transpose()?,
        })
    }
}

/// Encodes a tag set as a JSON array.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if serialization fails.
pub fn encode_tags(tags: &TagSet) -> Result<String> {
    let list: Vec<&str> = tags.iter().collect();
    serde_json::to_string(&list).map_err(|e| Error::OperationFailed {
        operation: "encode_tags".to_string(),
        cause: e.to_string(),
    })
}

/// Encodes a timestamp as epoch microseconds.
#[must_use]
pub fn to_micros(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

/// Decodes epoch microseconds.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] for out-of-range values.
pub fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| decode_error(format!("timestamp out of range: {micros}")))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| decode_error(format!("invalid id '{s}': {e}")))
}

fn decode_error(cause: String) -> Error {
    Error::OperationFailed {
        operation: "decode_row".to_string(),
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_preserve_subsecond_precision() {
        let dt = DateTime::from_timestamp_micros(1_740_000_000_123_456).unwrap();
        assert_eq!(from_micros(to_micros(&dt)).unwrap(), dt);
    }

    #[test]
    fn test_encode_tags_is_json_array() {
        let tags: TagSet = ["High intent", "a \"quoted\" tag"].into_iter().collect();
        let encoded = encode_tags(&tags).unwrap();
        let decoded: Vec<String> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, vec!["High intent", "a \"quoted\" tag"]);
    }
}
