use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AuthError, CourseError, EnrollmentError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    /// Business-rule conflict: credit cap, duplicate request, terminal
    /// state, taken email.
    Conflict(String),

    /// No session.
    Unauthorized(String),

    /// Authenticated but outside the actor's scope.
    Forbidden(String),

    /// OTP resend requested too soon.
    TooManyRequests(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::TooManyRequests(msg) => write!(f, "Too many requests: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::CreditLimitExceeded
            | EnrollmentError::DuplicateEnrollment
            | EnrollmentError::InvalidState(_) => Self::Conflict(err.to_string()),
            EnrollmentError::NotFound(_) | EnrollmentError::CourseNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            EnrollmentError::Unauthorized => Self::Forbidden(err.to_string()),
            EnrollmentError::Database(msg) => Self::DatabaseError(msg),
            EnrollmentError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<CourseError> for ApiError {
    fn from(err: CourseError) -> Self {
        match err {
            CourseError::NotFound(_) => Self::NotFound(err.to_string()),
            CourseError::Unauthorized => Self::Forbidden(err.to_string()),
            CourseError::Validation(_) => Self::ValidationError(err.to_string()),
            CourseError::Database(msg) => Self::DatabaseError(msg),
            CourseError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidOtp | AuthError::UserNotFound => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::ResendThrottled { .. } => Self::TooManyRequests(err.to_string()),
            AuthError::EmailTaken => Self::Conflict(err.to_string()),
            AuthError::Validation(_) => Self::ValidationError(err.to_string()),
            AuthError::Delivery(msg) | AuthError::Internal(msg) => Self::InternalError(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
