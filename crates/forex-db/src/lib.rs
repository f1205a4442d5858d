//! # forex-db: Database Layer for Forex
//!
//! This crate provides database access for the Forex inventory system.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Forex Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (POST /api/product-entries)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Service (transaction script, apps/api)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     forex-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (one per      │    │  (embedded)  │  │   │
//! │  │   │               │    │  table)       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ product       │    │ 001_initial_ │  │   │
//! │  │   │ begin()       │    │ residue, sale │    │   schema.sql │  │   │
//! │  │   │ acquire()     │    │ ...           │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        ┌───────▼───────┐                       │   │
//! │  │                        │    filter     │                       │   │
//! │  │                        │ (list screens)│                       │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (forex.db, WAL mode)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`filter`] - Client filtering requests turned into safe SQL
//! - [`repository`] - Query functions, one module per table
//!
//! ## Usage
//!
//! ```rust,ignore
//! use forex_db::{repository::product, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("forex.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let product = product::find_by_code(&mut tx, "101").await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod filter;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use filter::FilteringRequest;
pub use pool::{Database, DbConfig};
