// src/error.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{models::attempt::AttemptError, validation::FieldError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request with field-level details
    Validation(Vec<FieldError>),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate username, second feedback)
    Conflict(String),

    // 400 or 409 depending on the kind, see `status`
    Attempt(AttemptError),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::AuthError(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Attempt(e) => match e {
                AttemptError::InvalidQuestionReference { .. } => "INVALID_QUESTION_REFERENCE",
                AttemptError::InvalidOptionReference { .. } => "INVALID_OPTION_REFERENCE",
                AttemptError::AttemptNotInProgress { .. } => "ATTEMPT_NOT_IN_PROGRESS",
                AttemptError::InvalidAttemptTransition { .. } => "INVALID_ATTEMPT_TRANSITION",
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Attempt(e) => match e {
                AttemptError::InvalidQuestionReference { .. }
                | AttemptError::InvalidOptionReference { .. } => StatusCode::BAD_REQUEST,
                AttemptError::AttemptNotInProgress { .. }
                | AttemptError::InvalidAttemptTransition { .. } => StatusCode::CONFLICT,
            },
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg)
            | AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => f.write_str(msg),
            AppError::Validation(errors) => {
                write!(f, "Validation failed on {} field(s)", errors.len())
            }
            AppError::Attempt(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({
                    "error": "Internal Server Error",
                    "code": code,
                })
            }
            AppError::Validation(fields) => json!({
                "error": "Validation failed",
                "code": code,
                "fields": fields,
            }),
            other => json!({
                "error": other.to_string(),
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        AppError::Attempt(err)
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies, see `utils::extract::AppJson`.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::AttemptStatus;

    #[test]
    fn test_attempt_errors_map_to_caller_statuses() {
        let not_in_progress = AppError::from(AttemptError::AttemptNotInProgress {
            attempt_id: 3,
            status: AttemptStatus::Completed,
        });
        assert_eq!(not_in_progress.status(), StatusCode::CONFLICT);
        assert_eq!(not_in_progress.code(), "ATTEMPT_NOT_IN_PROGRESS");
        assert_eq!(not_in_progress.to_string(), "Attempt 3 is already completed");

        let bad_option = AppError::from(AttemptError::InvalidOptionReference {
            question_id: 1,
            option_id: 9,
        });
        assert_eq!(bad_option.status(), StatusCode::BAD_REQUEST);
        assert_eq!(bad_option.code(), "INVALID_OPTION_REFERENCE");
    }

    #[test]
    fn test_not_found_is_distinct_from_invalid_reference() {
        let missing = AppError::NotFound("Quiz not found".to_string());
        let invalid = AppError::from(AttemptError::InvalidQuestionReference { question_id: 4 });
        assert_ne!(missing.status(), invalid.status());
        assert_ne!(missing.code(), invalid.code());
    }
}
