//! Communication history entries.

use super::StudentId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conventional type for email contact.
pub const EMAIL: &str = "Email";
/// Conventional type for text messages.
pub const SMS: &str = "SMS";

/// Content recorded for the mocked follow-up email.
pub const FOLLOW_UP_EMAIL_CONTENT: &str = "Follow-up email sent";

/// An immutable record of contact with a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationLog {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning student.
    pub student_id: StudentId,
    /// Free-text category, conventionally [`EMAIL`] or [`SMS`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Description of the contact.
    pub content: Option<String>,
    /// When the contact happened. Always set for stored entries.
    #[serde(default, with = "super::timestamp::option")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CommunicationLog {
    /// Creates a log entry timestamped `now`.
    #[must_use]
    pub fn new(
        student_id: StudentId,
        kind: impl Into<String>,
        content: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            kind: kind.into(),
            content,
            timestamp: Some(super::timestamp::truncate(now)),
        }
    }
}

/// Payload for `POST /students/{id}/communication`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCommunication {
    /// Category of contact.
    #[serde(rename = "type")]
    pub kind: String,
    /// Description of the contact.
    #[serde(default)]
    pub content: Option<String>,
}

impl NewCommunication {
    /// Validates the payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the type is blank.
    pub fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(Error::InvalidInput(
                "communication type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Response for the mocked follow-up email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpReceipt {
    /// Human-readable confirmation.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_field_wire_name() {
        let log = CommunicationLog::new(StudentId::generate(), SMS, None, Utc::now());
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["type"], "SMS");
        assert!(json["content"].is_null());
    }

    #[test]
    fn test_blank_type_rejected() {
        let payload: NewCommunication =
            serde_json::from_str(r#"{"type": "  ", "content": "hi"}"#).unwrap();
        assert!(payload.validate().is_err());
    }
}
