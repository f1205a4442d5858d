//! # Repository Module
//!
//! Database access for every Forex table.
//!
//! ## Repository Functions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Service (apps/api)                                                     │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                                │
//! │       │  product::find_by_code(&mut tx, "101")                          │
//! │       │  residue::add_count(&mut tx, residue_id, 24)                    │
//! │       │  tx.commit().await?;                                            │
//! │       ▼                                                                 │
//! │  repository::<table>::<fn>(conn: &mut SqliteConnection, …)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Every function takes a connection instead of the pool, so any mix of   │
//! │  calls composes into one transaction. A pooled connection and a         │
//! │  transaction both deref to `SqliteConnection`.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `find_*` returns `Option<T>`, `get` returns `T` or `DbError::NotFound`
//! - `insert` ignores the entity's `id` and returns the new one
//! - Cascades are explicit (`delete_by_*`), never `ON DELETE CASCADE`

pub mod currency;
pub mod process;
pub mod product;
pub mod product_entry;
pub mod product_type;
pub mod residue;
pub mod sale;
pub mod semi_product;
pub mod shop;
pub mod transaction;
pub mod unit_measure;
pub mod user;
