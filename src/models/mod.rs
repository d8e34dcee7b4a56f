//! Data models for enrolla.
//!
//! Students are the aggregate root; communication logs belong to exactly one
//! student and are only read or written through it.

mod communication;
mod stats;
mod student;
pub mod tags;
pub mod timestamp;

pub use communication::{
    CommunicationLog, EMAIL, FOLLOW_UP_EMAIL_CONTENT, FollowUpReceipt, NewCommunication, SMS,
};
pub use stats::{
    CommunicationFrequency, EngagementMetrics, ResponsePattern, RiskLevel, StudentStats,
};
pub use student::{
    ApplicationStatus, NewStudent, NotesUpdate, Student, StudentId, StudentUpdate, TagsUpdate,
    is_valid_email,
};
pub use tags::{CanonicalTag, TagSet, has_tag};
