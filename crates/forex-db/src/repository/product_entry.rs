//! # Product Entry Repository
//!
//! Stock-in history. Every entry points at the residue it incremented, so
//! deleting an entry knows which residue to reverse and a bundle-size change
//! knows which residues to recompute.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{Money, ProductEntry};

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT e.id, e.date, e.count, e.bundle_item_count, e.cost_price, \
     e.preparation_cost_per_unit, e.unit_price, e.total_amount, e.production_origin, \
     e.product_type_id, e.shop_id, e.product_residue_id, e.currency_id, e.created_at \
     FROM product_entries e \
     JOIN product_types pt ON pt.id = e.product_type_id \
     JOIN products p ON p.id = pt.product_id";

/// Filterable entry columns.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "e.id"),
        ("date", "e.date"),
        ("count", "e.count"),
        ("shopid", "e.shop_id"),
        ("producttypeid", "e.product_type_id"),
        ("productid", "pt.product_id"),
        ("productcode", "p.code"),
        ("productionorigin", "e.production_origin"),
        ("currencyid", "e.currency_id"),
    ],
    search_columns: &["p.code", "p.name", "pt.type_name"],
    default_sort: "e.date",
};

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<ProductEntry>> {
    let sql = format!("{SELECT} WHERE e.id = ?");
    Ok(sqlx::query_as::<_, ProductEntry>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<ProductEntry> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("ProductEntry", id))
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<ProductEntry>> {
    let sql = format!("{SELECT} ORDER BY e.date DESC, e.id DESC");
    Ok(sqlx::query_as::<_, ProductEntry>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn filter(
    conn: &mut SqliteConnection,
    request: &FilteringRequest,
) -> DbResult<Vec<ProductEntry>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

pub async fn list_by_type(
    conn: &mut SqliteConnection,
    product_type_id: i64,
) -> DbResult<Vec<ProductEntry>> {
    let sql = format!("{SELECT} WHERE e.product_type_id = ? ORDER BY e.id");
    Ok(sqlx::query_as::<_, ProductEntry>(&sql)
        .bind(product_type_id)
        .fetch_all(&mut *conn)
        .await?)
}

/// Most recent entry of a type; its cost drives the sale cost price.
pub async fn latest_for_type(
    conn: &mut SqliteConnection,
    product_type_id: i64,
) -> DbResult<Option<ProductEntry>> {
    let sql = format!("{SELECT} WHERE e.product_type_id = ? ORDER BY e.date DESC, e.id DESC LIMIT 1");
    Ok(sqlx::query_as::<_, ProductEntry>(&sql)
        .bind(product_type_id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn insert(conn: &mut SqliteConnection, entry: &ProductEntry) -> DbResult<i64> {
    debug!(
        product_type_id = %entry.product_type_id,
        shop_id = %entry.shop_id,
        count = %entry.count,
        "Inserting product entry"
    );

    let id = sqlx::query(
        "INSERT INTO product_entries (date, count, bundle_item_count, cost_price,
                                      preparation_cost_per_unit, unit_price, total_amount,
                                      production_origin, product_type_id, shop_id,
                                      product_residue_id, currency_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.date)
    .bind(entry.count)
    .bind(entry.bundle_item_count)
    .bind(entry.cost_price)
    .bind(entry.preparation_cost_per_unit)
    .bind(entry.unit_price)
    .bind(entry.total_amount)
    .bind(entry.production_origin)
    .bind(entry.product_type_id)
    .bind(entry.shop_id)
    .bind(entry.product_residue_id)
    .bind(entry.currency_id)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Rewrites the bundle-dependent columns after a bundle size change.
pub async fn update_bundle(
    conn: &mut SqliteConnection,
    id: i64,
    count: i64,
    bundle_item_count: i64,
    total_amount: Money,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE product_entries SET count = ?, bundle_item_count = ?, total_amount = ? WHERE id = ?",
    )
    .bind(count)
    .bind(bundle_item_count)
    .bind(total_amount)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM product_entries WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ProductEntry", id));
    }
    Ok(())
}
