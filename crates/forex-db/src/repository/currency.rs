//! Currency lookups.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::Currency;

use crate::error::{DbError, DbResult};

const SELECT: &str = "SELECT id, code, name, normalized_name, symbol, exchange_rate, is_default, is_active FROM currencies";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Currency>> {
    let sql = format!("{SELECT} WHERE id = ?");
    Ok(sqlx::query_as::<_, Currency>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<Currency> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Currency", id))
}

pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Currency>> {
    let sql = format!("{SELECT} WHERE code = ?");
    Ok(sqlx::query_as::<_, Currency>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn find_default(conn: &mut SqliteConnection) -> DbResult<Option<Currency>> {
    let sql = format!("{SELECT} WHERE is_default = 1 ORDER BY id LIMIT 1");
    Ok(sqlx::query_as::<_, Currency>(&sql)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<Currency>> {
    let sql = format!("{SELECT} ORDER BY is_default DESC, id");
    Ok(sqlx::query_as::<_, Currency>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

/// Ids of every currency; accounts are opened in each of them.
pub async fn list_ids(conn: &mut SqliteConnection) -> DbResult<Vec<i64>> {
    Ok(sqlx::query_scalar("SELECT id FROM currencies ORDER BY id")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert(conn: &mut SqliteConnection, currency: &Currency) -> DbResult<i64> {
    debug!(code = %currency.code, "Inserting currency");

    let id = sqlx::query(
        "INSERT INTO currencies (code, name, normalized_name, symbol, exchange_rate, is_default, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&currency.code)
    .bind(&currency.name)
    .bind(&currency.normalized_name)
    .bind(&currency.symbol)
    .bind(currency.exchange_rate)
    .bind(currency.is_default)
    .bind(currency.is_active)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update(conn: &mut SqliteConnection, currency: &Currency) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE currencies
         SET code = ?, name = ?, normalized_name = ?, symbol = ?,
             exchange_rate = ?, is_default = ?, is_active = ?
         WHERE id = ?",
    )
    .bind(&currency.code)
    .bind(&currency.name)
    .bind(&currency.normalized_name)
    .bind(&currency.symbol)
    .bind(currency.exchange_rate)
    .bind(currency.is_default)
    .bind(currency.is_active)
    .bind(currency.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Currency", currency.id));
    }
    Ok(())
}

/// Clears the default flag on every currency except `keep_id`.
pub async fn clear_default_except(conn: &mut SqliteConnection, keep_id: i64) -> DbResult<()> {
    sqlx::query("UPDATE currencies SET is_default = 0 WHERE id <> ?")
        .bind(keep_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns `true` when prices, entries, sales or cash reference the currency.
pub async fn is_in_use(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let used: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM product_types WHERE currency_id = ?1)
             OR EXISTS(SELECT 1 FROM product_entries WHERE currency_id = ?1)
             OR EXISTS(SELECT 1 FROM sales WHERE currency_id = ?1)
             OR EXISTS(SELECT 1 FROM transactions WHERE currency_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(used)
}

/// Deletes the currency and its (zero) account rows.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM user_accounts WHERE currency_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM shop_cash_accounts WHERE currency_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM currencies WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
