//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookup by id and by business code
//! - Code uniqueness checks (excluding the product being edited)
//! - Filtering for the product list screen
//!
//! Product types, residues and entries live in their own modules; deleting
//! a product is a cascade the API performs type by type.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{Product, ProductionOrigin};

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT p.id, p.code, p.name, p.normalized_name, p.image_path, p.unit_measure_id, \
     p.production_origin, p.created_at, p.updated_at FROM products p";

/// Filterable product columns.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "p.id"),
        ("code", "p.code"),
        ("name", "p.normalized_name"),
        ("unitmeasureid", "p.unit_measure_id"),
        ("productionorigin", "p.production_origin"),
        ("createdat", "p.created_at"),
    ],
    search_columns: &["p.code", "p.name"],
    default_sort: "p.code",
};

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Product>> {
    let sql = format!("{SELECT} WHERE p.id = ?");
    Ok(sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<Product> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
}

pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Product>> {
    let sql = format!("{SELECT} WHERE p.code = ?");
    Ok(sqlx::query_as::<_, Product>(&sql)
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?)
}

/// Returns `true` when another product (not `exclude_id`) already uses `code`.
pub async fn code_taken(
    conn: &mut SqliteConnection,
    code: &str,
    exclude_id: Option<i64>,
) -> DbResult<bool> {
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE code = ? AND id <> ?)")
            .bind(code.trim())
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(&mut *conn)
            .await?;
    Ok(taken)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
    let sql = format!("{SELECT} ORDER BY p.code");
    Ok(sqlx::query_as::<_, Product>(&sql).fetch_all(&mut *conn).await?)
}

pub async fn filter(
    conn: &mut SqliteConnection,
    request: &FilteringRequest,
) -> DbResult<Vec<Product>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<i64> {
    debug!(code = %product.code, name = %product.name, "Inserting product");

    let id = sqlx::query(
        "INSERT INTO products (code, name, normalized_name, image_path, unit_measure_id,
                               production_origin, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(product.code.trim())
    .bind(&product.name)
    .bind(&product.normalized_name)
    .bind(&product.image_path)
    .bind(product.unit_measure_id)
    .bind(product.production_origin)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Writes every mutable column and bumps `updated_at`.
pub async fn update(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, "Updating product");

    let result = sqlx::query(
        "UPDATE products
         SET code = ?, name = ?, normalized_name = ?, image_path = ?, unit_measure_id = ?,
             production_origin = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(product.code.trim())
    .bind(&product.name)
    .bind(&product.normalized_name)
    .bind(&product.image_path)
    .bind(product.unit_measure_id)
    .bind(product.production_origin)
    .bind(Utc::now())
    .bind(product.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product.id));
    }
    Ok(())
}

pub async fn set_production_origin(
    conn: &mut SqliteConnection,
    id: i64,
    origin: ProductionOrigin,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET production_origin = ?, updated_at = ? WHERE id = ?")
        .bind(origin)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns `true` when any type of the product appears on a sale.
pub async fn has_sales(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let sold: bool = sqlx::query_scalar(
        "SELECT EXISTS(
             SELECT 1 FROM sale_items si
             JOIN product_types pt ON pt.id = si.product_type_id
             WHERE pt.product_id = ?
         )",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(sold)
}

/// Deletes the product row only; callers remove its types first.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
