//! HTTP error responses.

use crate::Error;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

/// An error on its way to the client.
///
/// Server-side causes are logged when the error is built and never sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    /// Generic 500 detail.
    pub const INTERNAL: &'static str = "Internal server error";

    /// Creates an error with an explicit status and detail.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// The response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The client-facing message.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Replaces the detail of a 5xx with `detail`; client errors pass through.
    #[must_use]
    pub fn or_server_detail(self, detail: &str) -> Self {
        if self.status.is_server_error() {
            Self::new(self.status, detail)
        } else {
            self
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(message) => Self::new(StatusCode::BAD_REQUEST, message),
            Error::NotFound { entity, .. } => {
                Self::new(StatusCode::NOT_FOUND, format!("{} not found", capitalize(entity)))
            },
            Error::StatsComputationFailed(ref cause) => {
                tracing::error!(%cause, "Statistics computation failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error calculating student statistics",
                )
            },
            Error::OperationFailed { .. } => {
                tracing::error!(error = %err, "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, Self::INTERNAL)
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "Blocking task did not complete");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, Self::INTERNAL)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: &self.detail,
            }),
        )
            .into_response()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = ApiError::from(Error::InvalidInput("Invalid student ID format".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Invalid student ID format");

        let err = ApiError::from(Error::student_not_found("abc"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.detail(), "Student not found");

        let err = ApiError::from(Error::StatsComputationFailed("locked".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "Error calculating student statistics");
    }

    #[test]
    fn test_internal_cause_is_hidden() {
        let err = ApiError::from(Error::OperationFailed {
            operation: "get_student".to_string(),
            cause: "database disk image is malformed".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), ApiError::INTERNAL);
    }

    #[test]
    fn test_server_detail_override_keeps_client_errors() {
        let err = ApiError::from(Error::student_not_found("x")).or_server_detail("Failed");
        assert_eq!(err.detail(), "Student not found");
        let err = ApiError::from(Error::OperationFailed {
            operation: "op".to_string(),
            cause: "boom".to_string(),
        })
        .or_server_detail("Failed to generate AI summary");
        assert_eq!(err.detail(), "Failed to generate AI summary");
    }
}
