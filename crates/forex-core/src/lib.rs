//! # forex-core: Pure Business Logic for Forex
//!
//! This crate holds the domain types and the rules behind stock and sales
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Forex Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Desktop client                               │   │
//! │  │    Products ──► Stock entries ──► Sales ──► Cash                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP JSON                              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    routes ──► services (transaction scripts)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ forex-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   stock   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  rebundle │  │   rules   │  │   │
//! │  │   │   Sale    │  │           │  │ sale math │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    forex-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Product, ProductType, Sale, User, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`stock`] - Bundle recompute, residue ledger, sale line math
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use forex_core::money::Money;
//! use forex_core::stock::SaleLine;
//!
//! // 5 bundles of 12 at 10.00, costing 6.00 each
//! let line = SaleLine::compute(5, 12, Money::from_minor(1000), Money::from_minor(600)).unwrap();
//! assert_eq!(line.total_count, 60);
//! assert_eq!(line.benefit.minor(), 24_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Lookups created on first use when a stock entry needs them.
pub const DEFAULT_SHOP_NAME: &str = "Default Shop";
pub const DEFAULT_UNIT_MEASURE_NAME: &str = "Dona";
pub const DEFAULT_UNIT_MEASURE_SYMBOL: &str = "dona";
pub const DEFAULT_CURRENCY_CODE: &str = "UZS";
pub const DEFAULT_CURRENCY_NAME: &str = "So'm";

/// Maximum length of any display name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Largest page a filter request may ask for.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Image uploads accepted by the API.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];
