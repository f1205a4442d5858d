//! # Product Type Repository
//!
//! Variants of a product plus their bill of materials
//! (`product_type_items`).
//!
//! ## Cascade Order
//! ```text
//! delete_cascade(type_id)
//!   ├── entry_to_processes   (production history)
//!   ├── in_processes         (production queue)
//!   ├── product_entries      (stock-in history)
//!   ├── product_residues     (stock per shop)
//!   ├── product_type_items   (bill of materials)
//!   └── product_types        (the type itself)
//! ```
//! Sale items are never cascaded: a type with sales must not be deleted,
//! and the API checks [`has_sales`] first.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{ProductType, ProductTypeItem};

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT pt.id, pt.product_id, pt.type_name, pt.bundle_item_count, pt.unit_price, \
     pt.currency_id FROM product_types pt JOIN products p ON p.id = pt.product_id";

/// Filterable product type columns.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "pt.id"),
        ("productid", "pt.product_id"),
        ("type", "pt.type_name"),
        ("typename", "pt.type_name"),
        ("unitprice", "pt.unit_price"),
        ("currencyid", "pt.currency_id"),
        ("productcode", "p.code"),
    ],
    search_columns: &["pt.type_name", "p.code", "p.name"],
    default_sort: "pt.id",
};

// =============================================================================
// Product Types
// =============================================================================

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<ProductType>> {
    let sql = format!("{SELECT} WHERE pt.id = ?");
    Ok(sqlx::query_as::<_, ProductType>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<ProductType> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("ProductType", id))
}

pub async fn find_by_name(
    conn: &mut SqliteConnection,
    product_id: i64,
    type_name: &str,
) -> DbResult<Option<ProductType>> {
    let sql = format!("{SELECT} WHERE pt.product_id = ? AND pt.type_name = ?");
    Ok(sqlx::query_as::<_, ProductType>(&sql)
        .bind(product_id)
        .bind(type_name.trim())
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list_by_product(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> DbResult<Vec<ProductType>> {
    let sql = format!("{SELECT} WHERE pt.product_id = ? ORDER BY pt.id");
    Ok(sqlx::query_as::<_, ProductType>(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<ProductType>> {
    let sql = format!("{SELECT} ORDER BY p.code, pt.id");
    Ok(sqlx::query_as::<_, ProductType>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn filter(
    conn: &mut SqliteConnection,
    request: &FilteringRequest,
) -> DbResult<Vec<ProductType>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

pub async fn insert(conn: &mut SqliteConnection, product_type: &ProductType) -> DbResult<i64> {
    debug!(
        product_id = %product_type.product_id,
        type_name = %product_type.type_name,
        "Inserting product type"
    );

    let id = sqlx::query(
        "INSERT INTO product_types (product_id, type_name, bundle_item_count, unit_price, currency_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(product_type.product_id)
    .bind(product_type.type_name.trim())
    .bind(product_type.bundle_item_count)
    .bind(product_type.unit_price)
    .bind(product_type.currency_id)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update(conn: &mut SqliteConnection, product_type: &ProductType) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE product_types
         SET type_name = ?, bundle_item_count = ?, unit_price = ?, currency_id = ?
         WHERE id = ?",
    )
    .bind(product_type.type_name.trim())
    .bind(product_type.bundle_item_count)
    .bind(product_type.unit_price)
    .bind(product_type.currency_id)
    .bind(product_type.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ProductType", product_type.id));
    }
    Ok(())
}

/// Returns `true` when the type appears on any sale.
pub async fn has_sales(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let sold: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sale_items WHERE product_type_id = ?)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(sold)
}

/// Deletes the type and everything hanging off it except sales.
pub async fn delete_cascade(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    debug!(product_type_id = %id, "Cascade-deleting product type");

    for sql in [
        "DELETE FROM entry_to_processes WHERE product_type_id = ?",
        "DELETE FROM in_processes WHERE product_type_id = ?",
        "DELETE FROM product_entries WHERE product_type_id = ?",
        "DELETE FROM product_residues WHERE product_type_id = ?",
        "DELETE FROM product_type_items WHERE product_type_id = ?",
        "DELETE FROM product_types WHERE id = ?",
    ] {
        sqlx::query(sql).bind(id).execute(&mut *conn).await?;
    }
    Ok(())
}

// =============================================================================
// Bill of Materials
// =============================================================================

pub async fn list_items(
    conn: &mut SqliteConnection,
    product_type_id: i64,
) -> DbResult<Vec<ProductTypeItem>> {
    Ok(sqlx::query_as::<_, ProductTypeItem>(
        "SELECT id, product_type_id, semi_product_id, quantity
         FROM product_type_items WHERE product_type_id = ? ORDER BY id",
    )
    .bind(product_type_id)
    .fetch_all(&mut *conn)
    .await?)
}

/// Replaces the bill of materials with `(semi_product_id, quantity)` lines.
pub async fn replace_items(
    conn: &mut SqliteConnection,
    product_type_id: i64,
    items: &[(i64, i64)],
) -> DbResult<()> {
    sqlx::query("DELETE FROM product_type_items WHERE product_type_id = ?")
        .bind(product_type_id)
        .execute(&mut *conn)
        .await?;

    for (semi_product_id, quantity) in items {
        sqlx::query(
            "INSERT INTO product_type_items (product_type_id, semi_product_id, quantity)
             VALUES (?, ?, ?)",
        )
        .bind(product_type_id)
        .bind(semi_product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
