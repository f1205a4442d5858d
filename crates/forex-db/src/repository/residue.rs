//! Stock on hand per (product type, shop).

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::stock::residue_from_history;
use forex_core::ProductResidue;

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT r.id, r.product_type_id, r.shop_id, r.count FROM product_residues r \
     JOIN product_types pt ON pt.id = r.product_type_id \
     JOIN products p ON p.id = pt.product_id";

/// Filterable residue columns. The sale screen asks for `count > 0`.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "r.id"),
        ("count", "r.count"),
        ("shopid", "r.shop_id"),
        ("producttypeid", "r.product_type_id"),
        ("productid", "pt.product_id"),
        ("productcode", "p.code"),
    ],
    search_columns: &["p.code", "p.name", "pt.type_name"],
    default_sort: "p.code",
};

pub async fn find(
    conn: &mut SqliteConnection,
    product_type_id: i64,
    shop_id: i64,
) -> DbResult<Option<ProductResidue>> {
    Ok(sqlx::query_as::<_, ProductResidue>(
        "SELECT id, product_type_id, shop_id, count FROM product_residues
         WHERE product_type_id = ? AND shop_id = ?",
    )
    .bind(product_type_id)
    .bind(shop_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<ProductResidue> {
    sqlx::query_as::<_, ProductResidue>(
        "SELECT id, product_type_id, shop_id, count FROM product_residues WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("ProductResidue", id))
}

/// Residues touched by the entries of a type (one per shop it was stocked in).
pub async fn list_by_type(
    conn: &mut SqliteConnection,
    product_type_id: i64,
) -> DbResult<Vec<ProductResidue>> {
    Ok(sqlx::query_as::<_, ProductResidue>(
        "SELECT id, product_type_id, shop_id, count FROM product_residues
         WHERE product_type_id = ? ORDER BY shop_id",
    )
    .bind(product_type_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<ProductResidue>> {
    let sql = format!("{SELECT} ORDER BY p.code, pt.id, r.shop_id");
    Ok(sqlx::query_as::<_, ProductResidue>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn filter(
    conn: &mut SqliteConnection,
    request: &FilteringRequest,
) -> DbResult<Vec<ProductResidue>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

pub async fn insert(
    conn: &mut SqliteConnection,
    product_type_id: i64,
    shop_id: i64,
    count: i64,
) -> DbResult<i64> {
    debug!(product_type_id = %product_type_id, shop_id = %shop_id, count = %count, "Opening residue");

    let id = sqlx::query(
        "INSERT INTO product_residues (product_type_id, shop_id, count) VALUES (?, ?, ?)",
    )
    .bind(product_type_id)
    .bind(shop_id)
    .bind(count)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Adds `delta` (may be negative) and returns the new count.
pub async fn add_count(conn: &mut SqliteConnection, id: i64, delta: i64) -> DbResult<i64> {
    let count: Option<i64> = sqlx::query_scalar(
        "UPDATE product_residues SET count = count + ? WHERE id = ? RETURNING count",
    )
    .bind(delta)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    count.ok_or_else(|| DbError::not_found("ProductResidue", id))
}

pub async fn set_count(conn: &mut SqliteConnection, id: i64, count: i64) -> DbResult<()> {
    sqlx::query("UPDATE product_residues SET count = ? WHERE id = ?")
        .bind(count)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Items recorded into the residue by stock entries.
pub async fn entered_count(conn: &mut SqliteConnection, id: i64) -> DbResult<i64> {
    Ok(sqlx::query_scalar(
        "SELECT COALESCE(SUM(count), 0) FROM product_entries WHERE product_residue_id = ?",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?)
}

/// Items of a type sold from a shop.
pub async fn sold_count(
    conn: &mut SqliteConnection,
    product_type_id: i64,
    shop_id: i64,
) -> DbResult<i64> {
    Ok(sqlx::query_scalar(
        "SELECT COALESCE(SUM(si.total_count), 0)
         FROM sale_items si JOIN sales s ON s.id = si.sale_id
         WHERE si.product_type_id = ? AND s.shop_id = ?",
    )
    .bind(product_type_id)
    .bind(shop_id)
    .fetch_one(&mut *conn)
    .await?)
}

/// Rebuilds the count from entry and sale history; returns the new count.
pub async fn recompute(conn: &mut SqliteConnection, id: i64) -> DbResult<i64> {
    let residue = get(&mut *conn, id).await?;
    let entered = entered_count(&mut *conn, id).await?;
    let sold = sold_count(&mut *conn, residue.product_type_id, residue.shop_id).await?;

    let count = residue_from_history(entered, sold);
    set_count(&mut *conn, id, count).await?;

    debug!(residue_id = %id, entered = %entered, sold = %sold, count = %count, "Residue recomputed");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_insert_add_and_find() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (_, shop_id, _, type_id) = test_support::seed_product(&mut conn).await;

        assert!(find(&mut conn, type_id, shop_id).await.unwrap().is_none());

        let id = insert(&mut conn, type_id, shop_id, 24).await.unwrap();
        assert_eq!(add_count(&mut conn, id, 12).await.unwrap(), 36);
        assert_eq!(add_count(&mut conn, id, -6).await.unwrap(), 30);

        let residue = find(&mut conn, type_id, shop_id).await.unwrap().unwrap();
        assert_eq!(residue.count, 30);
        assert!(add_count(&mut conn, 999, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_filter_positive_counts() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (_, shop_id, _, type_id) = test_support::seed_product(&mut conn).await;
        insert(&mut conn, type_id, shop_id, 0).await.unwrap();

        let request = FilteringRequest::default()
            .with_filter("Count", ">0")
            .with_filter("ProductType", "include:Product");
        assert!(filter(&mut conn, &request).await.unwrap().is_empty());

        let residue = find(&mut conn, type_id, shop_id).await.unwrap().unwrap();
        set_count(&mut conn, residue.id, 4).await.unwrap();
        assert_eq!(filter(&mut conn, &request).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recompute_without_history_is_zero() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (_, shop_id, _, type_id) = test_support::seed_product(&mut conn).await;
        let id = insert(&mut conn, type_id, shop_id, 50).await.unwrap();

        assert_eq!(recompute(&mut conn, id).await.unwrap(), 0);
        assert_eq!(get(&mut conn, id).await.unwrap().count, 0);
    }
}
