//! Student records and their write payloads.

use super::tags::TagSet;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(Uuid);

impl StudentId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `s` is not a UUID.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidInput("Invalid student ID format".to_string()))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for StudentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for StudentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a student is in the application funnel.
///
/// Serialized with the exact capitalized spellings stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApplicationStatus {
    /// Browsing programs.
    #[default]
    Exploring,
    /// Narrowing down a shortlist.
    Shortlisting,
    /// Actively preparing applications.
    Applying,
    /// Applications submitted.
    Submitted,
}

impl ApplicationStatus {
    /// Returns all status variants in funnel order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Exploring,
            Self::Shortlisting,
            Self::Applying,
            Self::Submitted,
        ]
    }

    /// Returns the status as stored and displayed.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exploring => "Exploring",
            Self::Shortlisting => "Shortlisting",
            Self::Applying => "Applying",
            Self::Submitted => "Submitted",
        }
    }

    /// Parses a status. Matching is exact: `"applying"` is rejected.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|status| status.as_str() == s)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An applicant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier.
    pub id: StudentId,
    /// Full name.
    pub name: String,
    /// Contact email, unique across students.
    pub email: String,
    /// Phone number.
    pub phone: Option<String>,
    /// Country of residence.
    pub country: Option<String>,
    /// Funnel stage.
    pub application_status: ApplicationStatus,
    /// Last time the student was seen active on the platform.
    #[serde(default, with = "super::timestamp::option")]
    pub last_active: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
    /// Segmentation tags.
    #[serde(default)]
    pub tags: TagSet,
    /// Staff-only notes.
    pub internal_notes: Option<String>,
}

impl Student {
    /// Builds a new record from a validated creation payload.
    #[must_use]
    pub fn from_new(new: NewStudent, now: DateTime<Utc>) -> Self {
        let now = super::timestamp::truncate(now);
        Self {
            id: StudentId::generate(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            country: new.country,
            application_status: new.application_status,
            last_active: new.last_active.map(super::timestamp::truncate),
            created_at: now,
            updated_at: now,
            tags: new.tags,
            internal_notes: new.internal_notes,
        }
    }

    /// Applies the supplied fields of a partial update.
    pub fn apply(&mut self, update: StudentUpdate, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
        if let Some(country) = update.country {
            self.country = country;
        }
        if let Some(status) = update.application_status {
            self.application_status = status;
        }
        if let Some(last_active) = update.last_active {
            self.last_active = last_active.map(super::timestamp::truncate);
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(notes) = update.internal_notes {
            self.internal_notes = notes;
        }
        self.touch(now);
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = super::timestamp::truncate(now);
    }
}

/// Payload for creating a student.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Country of residence.
    #[serde(default)]
    pub country: Option<String>,
    /// Funnel stage.
    pub application_status: ApplicationStatus,
    /// Last activity timestamp.
    #[serde(default, with = "super::timestamp::option")]
    pub last_active: Option<DateTime<Utc>>,
    /// Initial tags.
    #[serde(default, deserialize_with = "super::tags::deserialize_nullable")]
    pub tags: TagSet,
    /// Staff-only notes.
    #[serde(default)]
    pub internal_notes: Option<String>,
}

impl NewStudent {
    /// Validates required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name or malformed email.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_email(&self.email)
    }
}

/// Partial update: absent fields are left untouched.
///
/// Nullable fields use a double `Option` so `"phone": null` clears the value
/// while omitting `phone` keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New email.
    #[serde(default)]
    pub email: Option<String>,
    /// New phone (or `Some(None)` to clear).
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    /// New country (or `Some(None)` to clear).
    #[serde(default, deserialize_with = "present")]
    pub country: Option<Option<String>>,
    /// New funnel stage.
    #[serde(default)]
    pub application_status: Option<ApplicationStatus>,
    /// New last activity (or `Some(None)` to clear).
    #[serde(default, deserialize_with = "present_timestamp")]
    pub last_active: Option<Option<DateTime<Utc>>>,
    /// Replacement tag set.
    #[serde(default)]
    pub tags: Option<TagSet>,
    /// New notes (or `Some(None)` to clear).
    #[serde(default, deserialize_with = "present")]
    pub internal_notes: Option<Option<String>>,
}

impl StudentUpdate {
    /// Validates the supplied fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name or malformed email.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn present_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    super::timestamp::option::deserialize(deserializer).map(Some)
}

/// Payload for `PATCH /students/{id}/tags`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsUpdate {
    /// Replacement tags; `null` or missing clears all tags.
    #[serde(default, deserialize_with = "super::tags::deserialize_nullable")]
    pub tags: TagSet,
}

/// Payload for `PATCH /students/{id}/internal_notes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotesUpdate {
    /// Replacement notes.
    #[serde(default)]
    pub internal_notes: Option<String>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("name must not be empty".to_string()));
    }
    Ok(())
}

/// Checks that an email address is plausibly well-formed.
///
/// One `@`, a non-empty local part, and a dotted domain with no empty labels.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

fn validate_email(email: &str) -> Result<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid email address: {}",
            email.trim()
        )))
    }
}
