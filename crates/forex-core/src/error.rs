//! # Error Types
//!
//! Domain-specific error types for forex-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  forex-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  forex-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - What the client sees (status + message)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → HTTP response          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Each variant maps to one HTTP status family at the API edge:
/// `NotFound` → 404, `AlreadyExists` → 409, `Forbidden` → 403,
/// everything else → 400.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// A unique business key is already taken.
    ///
    /// ## When This Occurs
    /// - Product code reused
    /// - Shop or user name reused (compared after normalization)
    #[error("{entity} with {field} '{value}' already exists")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    /// The operation would invalidate history.
    ///
    /// ## User Workflow
    /// ```text
    /// Delete ProductType "36-41"
    ///      │
    ///      ▼
    /// Type has 14 sale items
    ///      │
    ///      ▼
    /// Forbidden("product type 36-41 has sales and cannot be deleted")
    /// ```
    #[error("{0}")]
    Forbidden(String),

    /// Not enough stock at the shop to complete a sale or revert an entry.
    #[error("Insufficient stock for {product_type}: available {available}, requested {requested}")]
    InsufficientStock {
        product_type: String,
        available: i64,
        requested: i64,
    },

    /// A business rule rejected the request (400).
    #[error("{0}")]
    Rule(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &str, key: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// Shorthand for [`CoreError::AlreadyExists`].
    pub fn already_exists(entity: &str, field: &str, value: impl ToString) -> Self {
        CoreError::AlreadyExists {
            entity: entity.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Arithmetic on the value left the representable range.
    #[error("{field} is too large")]
    Overflow { field: String },

    /// Value must be greater than zero.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be below zero.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., unsupported file extension).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_type: "24-29".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for 24-29: available 3, requested 5"
        );

        let err = CoreError::not_found("Product", 42);
        assert_eq!(err.to_string(), "Product not found: 42");

        let err = CoreError::already_exists("Product", "code", "101");
        assert_eq!(err.to_string(), "Product with code '101' already exists");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::MustBePositive {
            field: "bundle_item_count".to_string(),
        };
        assert_eq!(err.to_string(), "bundle_item_count must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
