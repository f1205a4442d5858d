//! Shops and their per-currency cash accounts.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{Money, Shop, ShopCashAccount};

use crate::error::{DbError, DbResult};

const SELECT: &str = "SELECT id, name, normalized_name, created_at FROM shops";
const SELECT_ACCOUNT: &str =
    "SELECT id, shop_id, currency_id, opening_balance, balance, discount FROM shop_cash_accounts";

// =============================================================================
// Shops
// =============================================================================

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Shop>> {
    let sql = format!("{SELECT} WHERE id = ?");
    Ok(sqlx::query_as::<_, Shop>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<Shop> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Shop", id))
}

pub async fn find_by_normalized_name(
    conn: &mut SqliteConnection,
    normalized_name: &str,
) -> DbResult<Option<Shop>> {
    let sql = format!("{SELECT} WHERE normalized_name = ?");
    Ok(sqlx::query_as::<_, Shop>(&sql)
        .bind(normalized_name)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<Shop>> {
    let sql = format!("{SELECT} ORDER BY id");
    Ok(sqlx::query_as::<_, Shop>(&sql).fetch_all(&mut *conn).await?)
}

/// Ids of every shop; a new currency opens a cash account in each.
pub async fn list_ids(conn: &mut SqliteConnection) -> DbResult<Vec<i64>> {
    Ok(sqlx::query_scalar("SELECT id FROM shops ORDER BY id")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert(conn: &mut SqliteConnection, shop: &Shop) -> DbResult<i64> {
    debug!(name = %shop.name, "Inserting shop");

    let id = sqlx::query("INSERT INTO shops (name, normalized_name, created_at) VALUES (?, ?, ?)")
        .bind(&shop.name)
        .bind(&shop.normalized_name)
        .bind(shop.created_at)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(id)
}

/// Returns `true` when the shop holds stock history, sales or cash movements.
pub async fn has_activity(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let active: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM product_entries WHERE shop_id = ?1)
             OR EXISTS(SELECT 1 FROM product_residues WHERE shop_id = ?1 AND count <> 0)
             OR EXISTS(SELECT 1 FROM sales WHERE shop_id = ?1)
             OR EXISTS(SELECT 1 FROM transactions WHERE shop_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(active)
}

/// Deletes a shop with its empty residues and cash accounts.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM product_residues WHERE shop_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM shop_cash_accounts WHERE shop_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM shops WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Cash Accounts
// =============================================================================

/// Opens a zero-balance cash account; no-op when it already exists.
pub async fn open_cash_account(
    conn: &mut SqliteConnection,
    shop_id: i64,
    currency_id: i64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO shop_cash_accounts (shop_id, currency_id, opening_balance, balance, discount)
         VALUES (?, ?, 0, 0, 0)
         ON CONFLICT (shop_id, currency_id) DO NOTHING",
    )
    .bind(shop_id)
    .bind(currency_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_cash_accounts(
    conn: &mut SqliteConnection,
    shop_id: i64,
) -> DbResult<Vec<ShopCashAccount>> {
    let sql = format!("{SELECT_ACCOUNT} WHERE shop_id = ? ORDER BY currency_id");
    Ok(sqlx::query_as::<_, ShopCashAccount>(&sql)
        .bind(shop_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn find_cash_account(
    conn: &mut SqliteConnection,
    shop_id: i64,
    currency_id: i64,
) -> DbResult<Option<ShopCashAccount>> {
    let sql = format!("{SELECT_ACCOUNT} WHERE shop_id = ? AND currency_id = ?");
    Ok(sqlx::query_as::<_, ShopCashAccount>(&sql)
        .bind(shop_id)
        .bind(currency_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Adds `delta` to the cash balance, opening the account when missing.
pub async fn adjust_cash_balance(
    conn: &mut SqliteConnection,
    shop_id: i64,
    currency_id: i64,
    delta: Money,
) -> DbResult<()> {
    open_cash_account(&mut *conn, shop_id, currency_id).await?;
    sqlx::query(
        "UPDATE shop_cash_accounts SET balance = balance + ? WHERE shop_id = ? AND currency_id = ?",
    )
    .bind(delta)
    .bind(shop_id)
    .bind(currency_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
