//! # Enrolla
//!
//! Applicant CRM backend for university admissions teams.
//!
//! Enrolla tracks applicant ("student") records, their tag-based
//! segmentation and communication history, and produces an LLM-written
//! engagement summary from a deterministic dossier of each student.
//!
//! ## Features
//!
//! - `SQLite` persistence with a request-scoped unit of work
//! - Cohort statistics over the active (last 180 days) population
//! - Deterministic context assembly for generative summaries
//! - Best-effort AI summaries that degrade to a fixed fallback text
//! - axum HTTP API and a `clap` CLI
//!
//! ## Example
//!
//! ```rust,ignore
//! use enrolla::services::{ContextAssembler, StatisticsEngine};
//! use enrolla::storage::Database;
//!
//! let db = Database::in_memory()?;
//! let stats = StatisticsEngine::compute(&db)?;
//! println!("{} active students", stats.active_students);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod http;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::EnrollaConfig;
pub use llm::LlmProvider;
pub use models::{
    ApplicationStatus, CommunicationLog, EngagementMetrics, NewCommunication, NewStudent, Student,
    StudentId, StudentStats, StudentUpdate,
};
pub use services::{
    AppContext, ContextAssembler, EngagementScorer, StatisticsEngine, StudentService,
    SummaryGenerator, SummaryOutcome,
};
pub use storage::{Database, UnitOfWork};

/// Error type for enrolla operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | HTTP |
/// |---------|-------------|------|
/// | `InvalidInput` | Malformed identifier, payload, or query parameter; duplicate email | 400 |
/// | `NotFound` | Referenced student does not exist | 404 |
/// | `OperationFailed` | `SQLite` failures, config I/O, LLM transport errors | 500 |
/// | `StatsComputationFailed` | Any statistics sub-count fails | 500 |
///
/// Generative backend failures never reach the HTTP layer: the summary
/// generator absorbs them into its fallback text.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A student identifier is not a valid UUID
    /// - A required payload field is blank or malformed
    /// - An email address is already registered
    /// - A `limit` query parameter is out of range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity ("student").
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail (the unit of work is rolled back)
    /// - Configuration files cannot be read or parsed
    /// - An LLM request fails, times out, or returns an unusable body
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Cohort statistics could not be computed as a whole.
    #[error("statistics computation failed: {0}")]
    StatsComputationFailed(String),
}

impl Error {
    /// Builds a not-found error for a student.
    #[must_use]
    pub fn student_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "student",
            id: id.to_string(),
        }
    }

    /// Returns true for errors the caller can correct (bad input, missing entity).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotFound { .. })
    }
}

/// Result type alias for enrolla operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::student_not_found("abc");
        assert_eq!(err.to_string(), "student not found: abc");

        let err = Error::StatsComputationFailed("disk I/O error".to_string());
        assert_eq!(
            err.to_string(),
            "statistics computation failed: disk I/O error"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::InvalidInput(String::new()).is_client_error());
        assert!(Error::student_not_found("x").is_client_error());
        assert!(!Error::StatsComputationFailed(String::new()).is_client_error());
        assert!(
            !Error::OperationFailed {
                operation: "op".to_string(),
                cause: "cause".to_string(),
            }
            .is_client_error()
        );
    }
}
