//! Semi-products (raw materials) and their purchase entries.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{Money, SemiProduct, SemiProductEntry};

use crate::error::{DbError, DbResult};

const SELECT: &str =
    "SELECT id, name, normalized_name, unit_measure_id, image_path FROM semi_products";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<SemiProduct>> {
    let sql = format!("{SELECT} WHERE id = ?");
    Ok(sqlx::query_as::<_, SemiProduct>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<SemiProduct> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("SemiProduct", id))
}

pub async fn find_by_normalized_name(
    conn: &mut SqliteConnection,
    normalized_name: &str,
) -> DbResult<Option<SemiProduct>> {
    let sql = format!("{SELECT} WHERE normalized_name = ?");
    Ok(sqlx::query_as::<_, SemiProduct>(&sql)
        .bind(normalized_name)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<SemiProduct>> {
    let sql = format!("{SELECT} ORDER BY name");
    Ok(sqlx::query_as::<_, SemiProduct>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert(conn: &mut SqliteConnection, semi: &SemiProduct) -> DbResult<i64> {
    debug!(name = %semi.name, "Inserting semi-product");

    let id = sqlx::query(
        "INSERT INTO semi_products (name, normalized_name, unit_measure_id, image_path)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&semi.name)
    .bind(&semi.normalized_name)
    .bind(semi.unit_measure_id)
    .bind(&semi.image_path)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

// =============================================================================
// Entries
// =============================================================================

pub async fn insert_entry(conn: &mut SqliteConnection, entry: &SemiProductEntry) -> DbResult<i64> {
    debug!(
        semi_product_id = %entry.semi_product_id,
        quantity = %entry.quantity,
        "Inserting semi-product entry"
    );

    let id = sqlx::query(
        "INSERT INTO semi_product_entries (semi_product_id, quantity, cost_price, date)
         VALUES (?, ?, ?, ?)",
    )
    .bind(entry.semi_product_id)
    .bind(entry.quantity)
    .bind(entry.cost_price)
    .bind(entry.date)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn list_entries(
    conn: &mut SqliteConnection,
    semi_product_id: i64,
) -> DbResult<Vec<SemiProductEntry>> {
    Ok(sqlx::query_as::<_, SemiProductEntry>(
        "SELECT id, semi_product_id, quantity, cost_price, date FROM semi_product_entries
         WHERE semi_product_id = ? ORDER BY date DESC, id DESC",
    )
    .bind(semi_product_id)
    .fetch_all(&mut *conn)
    .await?)
}

/// Unit cost of the most recent purchase, `None` when never purchased.
pub async fn latest_cost(
    conn: &mut SqliteConnection,
    semi_product_id: i64,
) -> DbResult<Option<Money>> {
    Ok(sqlx::query_scalar(
        "SELECT cost_price FROM semi_product_entries
         WHERE semi_product_id = ? ORDER BY date DESC, id DESC LIMIT 1",
    )
    .bind(semi_product_id)
    .fetch_optional(&mut *conn)
    .await?)
}
