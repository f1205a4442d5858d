//! # Validation Module
//!
//! Input validation utilities for Forex.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Desktop client                                               │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: API service (Rust)                                           │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use forex_core::validation::{normalize_name, validate_bundle_item_count};
//!
//! assert_eq!(normalize_name("  Default Shop "), "DEFAULT SHOP");
//! assert!(validate_bundle_item_count(12).is_ok());
//! assert!(validate_bundle_item_count(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{ALLOWED_IMAGE_EXTENSIONS, MAX_NAME_LENGTH, MAX_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Normalization
// =============================================================================

/// Normalizes a display name for uniqueness comparisons.
///
/// Trims surrounding whitespace and upper-cases, so `"Ali "` and `"ali"`
/// collide.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Returns `true` when the value is `None` or only whitespace.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a field carries a non-blank value.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a display name (product, shop, user, type...).
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_NAME_LENGTH`] characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    validate_required(field, name)?;

    if name.trim().chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use forex_core::validation::validate_product_code;
///
/// assert!(validate_product_code("101").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("10 1").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    validate_required("code", code)?;

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an entity id coming from the client.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a count of items, bundles or units (> 0).
pub fn validate_count(field: &str, count: i64) -> ValidationResult<()> {
    if count <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Bundle size must be positive: it divides historical entry counts.
pub fn validate_bundle_item_count(count: i64) -> ValidationResult<()> {
    validate_count("bundle_item_count", count)
}

/// Validates a non-negative amount (prices, costs).
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Unit price may be zero (free samples) but never negative.
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    validate_amount("unit_price", price)
}

/// Validates a requested page size.
pub fn validate_page_size(size: u32) -> ValidationResult<()> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Uploads
// =============================================================================

/// Returns `true` for storage keys still in the temporary upload area.
///
/// Keys look like `uploads/temp/products/20250101/ab12cd34ef56.png`.
pub fn is_temp_key(key: &str) -> bool {
    key.contains("/temp/") || key.starts_with("temp/")
}

/// Validates the extension of an uploaded image file name.
///
/// Returns the lower-cased extension including the dot.
pub fn validate_image_file_name(file_name: &str) -> ValidationResult<String> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    if !ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::NotAllowed {
            field: "file extension".to_string(),
            allowed: ALLOWED_IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        });
    }

    Ok(ext)
}

// =============================================================================
// Unit Tests
// =============================================================================
