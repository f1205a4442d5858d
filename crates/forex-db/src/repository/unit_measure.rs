//! Unit measure lookups.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::UnitMeasure;

use crate::error::{DbError, DbResult};

const SELECT: &str = "SELECT id, name, normalized_name, symbol, description, is_default, is_active, position FROM unit_measures";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<UnitMeasure>> {
    let sql = format!("{SELECT} WHERE id = ?");
    Ok(sqlx::query_as::<_, UnitMeasure>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<UnitMeasure> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("UnitMeasure", id))
}

pub async fn find_default(conn: &mut SqliteConnection) -> DbResult<Option<UnitMeasure>> {
    let sql = format!("{SELECT} WHERE is_default = 1 ORDER BY id LIMIT 1");
    Ok(sqlx::query_as::<_, UnitMeasure>(&sql)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn find_by_normalized_name(
    conn: &mut SqliteConnection,
    normalized_name: &str,
) -> DbResult<Option<UnitMeasure>> {
    let sql = format!("{SELECT} WHERE normalized_name = ?");
    Ok(sqlx::query_as::<_, UnitMeasure>(&sql)
        .bind(normalized_name)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<UnitMeasure>> {
    let sql = format!("{SELECT} ORDER BY position, id");
    Ok(sqlx::query_as::<_, UnitMeasure>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert(conn: &mut SqliteConnection, unit: &UnitMeasure) -> DbResult<i64> {
    debug!(name = %unit.name, "Inserting unit measure");

    let id = sqlx::query(
        "INSERT INTO unit_measures (name, normalized_name, symbol, description, is_default, is_active, position)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&unit.name)
    .bind(&unit.normalized_name)
    .bind(&unit.symbol)
    .bind(&unit.description)
    .bind(unit.is_default)
    .bind(unit.is_active)
    .bind(unit.position)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update(conn: &mut SqliteConnection, unit: &UnitMeasure) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE unit_measures
         SET name = ?, normalized_name = ?, symbol = ?, description = ?,
             is_default = ?, is_active = ?, position = ?
         WHERE id = ?",
    )
    .bind(&unit.name)
    .bind(&unit.normalized_name)
    .bind(&unit.symbol)
    .bind(&unit.description)
    .bind(unit.is_default)
    .bind(unit.is_active)
    .bind(unit.position)
    .bind(unit.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("UnitMeasure", unit.id));
    }
    Ok(())
}

/// Clears the default flag on every unit except `keep_id`.
pub async fn clear_default_except(conn: &mut SqliteConnection, keep_id: i64) -> DbResult<()> {
    sqlx::query("UPDATE unit_measures SET is_default = 0 WHERE id <> ?")
        .bind(keep_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns `true` when a product or semi-product uses the unit.
pub async fn is_in_use(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let used: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM products WHERE unit_measure_id = ?1)
             OR EXISTS(SELECT 1 FROM semi_products WHERE unit_measure_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(used)
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM unit_measures WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
