//! Cash movements between users and shop cash boxes.

use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::Transaction;

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT t.id, t.date, t.kind, t.user_id, t.shop_id, t.currency_id, t.amount, \
     t.description, t.created_at FROM transactions t JOIN users u ON u.id = t.user_id";

/// Filterable transaction columns.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "t.id"),
        ("date", "t.date"),
        ("kind", "t.kind"),
        ("userid", "t.user_id"),
        ("shopid", "t.shop_id"),
        ("currencyid", "t.currency_id"),
        ("amount", "t.amount"),
    ],
    search_columns: &["u.name", "t.description"],
    default_sort: "t.date",
};

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Transaction>> {
    let sql = format!("{SELECT} WHERE t.id = ?");
    Ok(sqlx::query_as::<_, Transaction>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<Transaction> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Transaction", id))
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<Transaction>> {
    let sql = format!("{SELECT} ORDER BY t.date DESC, t.id DESC");
    Ok(sqlx::query_as::<_, Transaction>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn filter(
    conn: &mut SqliteConnection,
    request: &FilteringRequest,
) -> DbResult<Vec<Transaction>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

pub async fn insert(conn: &mut SqliteConnection, transaction: &Transaction) -> DbResult<i64> {
    debug!(
        kind = ?transaction.kind,
        user_id = %transaction.user_id,
        amount = %transaction.amount,
        "Inserting transaction"
    );

    let id = sqlx::query(
        "INSERT INTO transactions (date, kind, user_id, shop_id, currency_id, amount,
                                   description, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(transaction.date)
    .bind(transaction.kind)
    .bind(transaction.user_id)
    .bind(transaction.shop_id)
    .bind(transaction.currency_id)
    .bind(transaction.amount)
    .bind(&transaction.description)
    .bind(transaction.created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update(conn: &mut SqliteConnection, transaction: &Transaction) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE transactions
         SET date = ?, kind = ?, user_id = ?, shop_id = ?, currency_id = ?, amount = ?,
             description = ?
         WHERE id = ?",
    )
    .bind(transaction.date)
    .bind(transaction.kind)
    .bind(transaction.user_id)
    .bind(transaction.shop_id)
    .bind(transaction.currency_id)
    .bind(transaction.amount)
    .bind(&transaction.description)
    .bind(transaction.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Transaction", transaction.id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Transaction", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{test_support, user};
    use chrono::Utc;
    use forex_core::{Money, TransactionKind, User, UserRole};

    async fn seed_user(conn: &mut SqliteConnection) -> i64 {
        let now = Utc::now();
        user::insert(
            conn,
            &User {
                id: 0,
                name: "Zavod".to_string(),
                normalized_name: "ZAVOD".to_string(),
                username: None,
                phone: None,
                email: None,
                role: UserRole::Supplier,
                address: None,
                description: None,
                password_hash: None,
                profile_image: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap()
    }

    fn payment(user_id: i64, shop_id: i64, currency_id: i64, amount: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: 0,
            date: now,
            kind: TransactionKind::Income,
            user_id,
            shop_id,
            currency_id,
            amount: Money::from_minor(amount),
            description: Some("naqd".to_string()),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (currency_id, shop_id, ..) = test_support::seed_product(&mut conn).await;
        let user_id = seed_user(&mut conn).await;

        let id = insert(&mut conn, &payment(user_id, shop_id, currency_id, 5000))
            .await
            .unwrap();

        let mut stored = get(&mut conn, id).await.unwrap();
        assert_eq!(stored.kind, TransactionKind::Income);
        stored.kind = TransactionKind::Expense;
        stored.amount = Money::from_minor(7000);
        update(&mut conn, &stored).await.unwrap();

        let reloaded = get(&mut conn, id).await.unwrap();
        assert_eq!(reloaded.kind, TransactionKind::Expense);
        assert_eq!(reloaded.amount, Money::from_minor(7000));

        delete(&mut conn, id).await.unwrap();
        assert!(matches!(get(&mut conn, id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_non_positive_amount_violates_check() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (currency_id, shop_id, ..) = test_support::seed_product(&mut conn).await;
        let user_id = seed_user(&mut conn).await;

        assert!(matches!(
            insert(&mut conn, &payment(user_id, shop_id, currency_id, 0)).await,
            Err(DbError::CheckViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_filter_by_kind() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (currency_id, shop_id, ..) = test_support::seed_product(&mut conn).await;
        let user_id = seed_user(&mut conn).await;

        insert(&mut conn, &payment(user_id, shop_id, currency_id, 1000))
            .await
            .unwrap();
        let mut expense = payment(user_id, shop_id, currency_id, 2000);
        expense.kind = TransactionKind::Expense;
        insert(&mut conn, &expense).await.unwrap();

        let request = FilteringRequest::default().with_filter("kind", "expense");
        let found = filter(&mut conn, &request).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, Money::from_minor(2000));
    }
}
