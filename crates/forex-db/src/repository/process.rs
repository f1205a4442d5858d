//! Production queue: items sent to production (`entry_to_processes`) and
//! the running in-process count per type (`in_processes`).

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{EntryToProcess, InProcess};

use crate::error::DbResult;

pub async fn insert_entry(conn: &mut SqliteConnection, entry: &EntryToProcess) -> DbResult<i64> {
    debug!(product_type_id = %entry.product_type_id, count = %entry.count, "Sending to production");

    let id = sqlx::query(
        "INSERT INTO entry_to_processes (product_type_id, count, date) VALUES (?, ?, ?)",
    )
    .bind(entry.product_type_id)
    .bind(entry.count)
    .bind(entry.date)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn list_entries(conn: &mut SqliteConnection) -> DbResult<Vec<EntryToProcess>> {
    Ok(sqlx::query_as::<_, EntryToProcess>(
        "SELECT id, product_type_id, count, date FROM entry_to_processes ORDER BY date DESC, id DESC",
    )
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn find_in_process(
    conn: &mut SqliteConnection,
    product_type_id: i64,
) -> DbResult<Option<InProcess>> {
    Ok(sqlx::query_as::<_, InProcess>(
        "SELECT id, product_type_id, count FROM in_processes WHERE product_type_id = ?",
    )
    .bind(product_type_id)
    .fetch_optional(&mut *conn)
    .await?)
}

/// Adds `delta` to the in-process count, creating the row when missing.
/// Returns the new count.
pub async fn add_in_process(
    conn: &mut SqliteConnection,
    product_type_id: i64,
    delta: i64,
) -> DbResult<i64> {
    Ok(sqlx::query_scalar(
        "INSERT INTO in_processes (product_type_id, count) VALUES (?1, ?2)
         ON CONFLICT (product_type_id) DO UPDATE SET count = count + excluded.count
         RETURNING count",
    )
    .bind(product_type_id)
    .bind(delta)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn set_in_process(conn: &mut SqliteConnection, id: i64, count: i64) -> DbResult<()> {
    sqlx::query("UPDATE in_processes SET count = ? WHERE id = ?")
        .bind(count)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn list_in_process(conn: &mut SqliteConnection) -> DbResult<Vec<InProcess>> {
    Ok(sqlx::query_as::<_, InProcess>(
        "SELECT id, product_type_id, count FROM in_processes WHERE count > 0 ORDER BY product_type_id",
    )
    .fetch_all(&mut *conn)
    .await?)
}
