//! # Sale Repository
//!
//! Sales and their lines. Reverting a sale (update or delete) needs the old
//! lines, so [`items_by_sale`] is read before [`delete_items`].

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{Sale, SaleItem};

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT s.id, s.date, s.customer_id, s.shop_id, s.currency_id, s.total_count, \
     s.cost_price, s.benefit, s.total_amount, s.note, s.created_at \
     FROM sales s JOIN users u ON u.id = s.customer_id";

const SELECT_ITEM: &str = "SELECT id, sale_id, product_type_id, bundle_count, bundle_item_count, \
     total_count, unit_price, cost_price, benefit, amount FROM sale_items";

/// Filterable sale columns.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "s.id"),
        ("date", "s.date"),
        ("customerid", "s.customer_id"),
        ("shopid", "s.shop_id"),
        ("currencyid", "s.currency_id"),
        ("totalamount", "s.total_amount"),
        ("totalcount", "s.total_count"),
    ],
    search_columns: &["u.name", "u.phone", "s.note"],
    default_sort: "s.date",
};

// =============================================================================
// Sales
// =============================================================================

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Sale>> {
    let sql = format!("{SELECT} WHERE s.id = ?");
    Ok(sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<Sale> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<Sale>> {
    let sql = format!("{SELECT} ORDER BY s.date DESC, s.id DESC");
    Ok(sqlx::query_as::<_, Sale>(&sql).fetch_all(&mut *conn).await?)
}

pub async fn filter(conn: &mut SqliteConnection, request: &FilteringRequest) -> DbResult<Vec<Sale>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<i64> {
    debug!(
        customer_id = %sale.customer_id,
        shop_id = %sale.shop_id,
        total_amount = %sale.total_amount,
        "Inserting sale"
    );

    let id = sqlx::query(
        "INSERT INTO sales (date, customer_id, shop_id, currency_id, total_count, cost_price,
                            benefit, total_amount, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(sale.date)
    .bind(sale.customer_id)
    .bind(sale.shop_id)
    .bind(sale.currency_id)
    .bind(sale.total_count)
    .bind(sale.cost_price)
    .bind(sale.benefit)
    .bind(sale.total_amount)
    .bind(&sale.note)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Rewrites a sale header in place; `created_at` is kept.
pub async fn update(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE sales
         SET date = ?, customer_id = ?, shop_id = ?, currency_id = ?, total_count = ?,
             cost_price = ?, benefit = ?, total_amount = ?, note = ?
         WHERE id = ?",
    )
    .bind(sale.date)
    .bind(sale.customer_id)
    .bind(sale.shop_id)
    .bind(sale.currency_id)
    .bind(sale.total_count)
    .bind(sale.cost_price)
    .bind(sale.benefit)
    .bind(sale.total_amount)
    .bind(&sale.note)
    .bind(sale.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", sale.id));
    }
    Ok(())
}

/// Deletes the sale header; callers delete its items first.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM sales WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Items
// =============================================================================

pub async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<i64> {
    let id = sqlx::query(
        "INSERT INTO sale_items (sale_id, product_type_id, bundle_count, bundle_item_count,
                                 total_count, unit_price, cost_price, benefit, amount)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item.sale_id)
    .bind(item.product_type_id)
    .bind(item.bundle_count)
    .bind(item.bundle_item_count)
    .bind(item.total_count)
    .bind(item.unit_price)
    .bind(item.cost_price)
    .bind(item.benefit)
    .bind(item.amount)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn items_by_sale(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<SaleItem>> {
    let sql = format!("{SELECT_ITEM} WHERE sale_id = ? ORDER BY id");
    Ok(sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn delete_items(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM sale_items WHERE sale_id = ?")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
