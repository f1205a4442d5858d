//! # API Error Type
//!
//! Unified error type for HTTP handlers and services.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Forex API                              │
//! │                                                                         │
//! │  Handler ──► Service ──► Result<T, ApiError>                            │
//! │                 │                                                       │
//! │                 ├── DbError         (NotFound, UniqueViolation, ...)    │
//! │                 ├── CoreError       (Forbidden, InsufficientStock, ...) │
//! │                 ├── ValidationError (Required, MustBePositive, ...)     │
//! │                 ├── StorageError    (S3 failures)                       │
//! │                 └── AuthError       (bad credentials, bad token)        │
//! │                           │                                             │
//! │                           ▼                                             │
//! │                ApiError { code, message }                               │
//! │                           │                                             │
//! │                           ▼                                             │
//! │   HTTP status + { "statusCode": 404, "message": "...", "data": null }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! System failures are logged with their details and reach the client as a
//! generic message. The open transaction of a failing service is dropped,
//! which rolls it back.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use forex_core::{CoreError, ValidationError};
use forex_db::DbError;

use crate::auth::AuthError;
use crate::response::ApiResponse;
use crate::storage::StorageError;

/// Error returned by every service and handler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes and the HTTP status each one maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Business rule rejected the request (400)
    BusinessRule,

    /// Insufficient stock (400)
    InsufficientStock,

    /// Unique key already taken (409)
    AlreadyExists,

    /// Operation would invalidate history (403)
    Forbidden,

    /// Missing or invalid credentials (401)
    Unauthorized,

    /// Database operation failed (500)
    DatabaseError,

    /// Object storage failed (500)
    StorageError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::BusinessRule | ErrorCode::InsufficientStock => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::DatabaseError | ErrorCode::StorageError | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

/// Convenience alias used by services and handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::AlreadyExists,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::warn!("Check constraint violation: {}", message);
                ApiError::validation("Value out of range")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, key } => ApiError::not_found(&entity, key),
            e @ CoreError::AlreadyExists { .. } => {
                ApiError::new(ErrorCode::AlreadyExists, e.to_string())
            }
            CoreError::Forbidden(message) => ApiError::forbidden(message),
            e @ CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, e.to_string())
            }
            CoreError::Rule(message) => ApiError::new(ErrorCode::BusinessRule, message),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidFile(e) => ApiError::validation(e.to_string()),
            StorageError::TooLarge { .. } => ApiError::validation(err.to_string()),
            other => {
                tracing::error!("Object storage failed: {}", other);
                ApiError::new(ErrorCode::StorageError, "File storage operation failed")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hashing(e) | AuthError::TokenCreation(e) => {
                tracing::error!("Authentication internals failed: {}", e);
                ApiError::internal("Authentication failed")
            }
            AuthError::AdminOnly => ApiError::forbidden(err.to_string()),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Writes the response envelope with the mapped status.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(status, self.message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = CoreError::not_found("Product", 7).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Product not found: 7");

        let err: ApiError = CoreError::Forbidden("type has sales".to_string()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: ApiError = CoreError::already_exists("Shop", "name", "Chilonzor").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = CoreError::InsufficientStock {
            product_type: "24-29".to_string(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }

    #[test]
    fn test_system_errors_hide_details() {
        let err: ApiError = DbError::QueryFailed("no such column: secret".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("secret"));

        let err: ApiError = DbError::duplicate("code", "101").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_auth_errors() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: ApiError = AuthError::AdminOnly.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
