//! # User Repository
//!
//! Users (staff, customers, suppliers) and their per-currency accounts.
//!
//! ## Account Balances
//! ```text
//! balance = opening_balance
//!         − Σ sales to the user            (in the sale currency)
//!         + Σ income transactions           (user paid the shop)
//!         − Σ expense transactions          (shop paid the user)
//! ```
//! Sales and transactions move `balance` through [`adjust_balance`];
//! editing a user resets `balance` to the submitted opening balance.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use forex_core::{Money, User, UserAccount};

use crate::error::{DbError, DbResult};
use crate::filter::{fetch_filtered, FilterSpec, FilteringRequest};

const SELECT: &str = "SELECT u.id, u.name, u.normalized_name, u.username, u.phone, u.email, u.role, \
     u.address, u.description, u.password_hash, u.profile_image, u.created_at, u.updated_at FROM users u";

const SELECT_ACCOUNT: &str =
    "SELECT id, user_id, currency_id, opening_balance, balance, discount FROM user_accounts";

/// Filterable user columns.
pub const FILTER: FilterSpec = FilterSpec {
    columns: &[
        ("id", "u.id"),
        ("name", "u.normalized_name"),
        ("username", "u.username"),
        ("phone", "u.phone"),
        ("role", "u.role"),
        ("createdat", "u.created_at"),
    ],
    search_columns: &["u.name", "u.phone", "u.username"],
    default_sort: "u.name",
};

// =============================================================================
// Users
// =============================================================================

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<User>> {
    let sql = format!("{SELECT} WHERE u.id = ?");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<User> {
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))
}

pub async fn find_by_normalized_name(
    conn: &mut SqliteConnection,
    normalized_name: &str,
) -> DbResult<Option<User>> {
    let sql = format!("{SELECT} WHERE u.normalized_name = ?");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(normalized_name)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> DbResult<Option<User>> {
    let sql = format!("{SELECT} WHERE u.username = ?");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<User>> {
    let sql = format!("{SELECT} ORDER BY u.name");
    Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&mut *conn).await?)
}

pub async fn filter(
    conn: &mut SqliteConnection,
    request: &FilteringRequest,
) -> DbResult<Vec<User>> {
    fetch_filtered(conn, SELECT, &FILTER, request).await
}

/// Number of admin users (the API bootstraps one when zero).
pub async fn count_admins(conn: &mut SqliteConnection) -> DbResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(&mut *conn)
        .await?)
}

pub async fn insert(conn: &mut SqliteConnection, user: &User) -> DbResult<i64> {
    debug!(name = %user.name, role = ?user.role, "Inserting user");

    let id = sqlx::query(
        "INSERT INTO users (name, normalized_name, username, phone, email, role, address,
                            description, password_hash, profile_image, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.name)
    .bind(&user.normalized_name)
    .bind(&user.username)
    .bind(&user.phone)
    .bind(&user.email)
    .bind(user.role)
    .bind(&user.address)
    .bind(&user.description)
    .bind(&user.password_hash)
    .bind(&user.profile_image)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Writes every mutable column and bumps `updated_at`.
pub async fn update(conn: &mut SqliteConnection, user: &User) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE users
         SET name = ?, normalized_name = ?, username = ?, phone = ?, email = ?, role = ?,
             address = ?, description = ?, password_hash = ?, profile_image = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&user.name)
    .bind(&user.normalized_name)
    .bind(&user.username)
    .bind(&user.phone)
    .bind(&user.email)
    .bind(user.role)
    .bind(&user.address)
    .bind(&user.description)
    .bind(&user.password_hash)
    .bind(&user.profile_image)
    .bind(Utc::now())
    .bind(user.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("User", user.id));
    }
    Ok(())
}

/// Returns `true` when sales or cash transactions reference the user.
pub async fn has_history(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let used: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sales WHERE customer_id = ?1)
             OR EXISTS(SELECT 1 FROM transactions WHERE user_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(used)
}

/// Deletes a user and their accounts.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM user_accounts WHERE user_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Accounts
// =============================================================================

pub async fn list_accounts(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> DbResult<Vec<UserAccount>> {
    let sql = format!("{SELECT_ACCOUNT} WHERE user_id = ? ORDER BY currency_id");
    Ok(sqlx::query_as::<_, UserAccount>(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn find_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    currency_id: i64,
) -> DbResult<Option<UserAccount>> {
    let sql = format!("{SELECT_ACCOUNT} WHERE user_id = ? AND currency_id = ?");
    Ok(sqlx::query_as::<_, UserAccount>(&sql)
        .bind(user_id)
        .bind(currency_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Creates or overwrites an account; `balance` restarts at `opening_balance`.
pub async fn upsert_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    currency_id: i64,
    opening_balance: Money,
    discount: Money,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO user_accounts (user_id, currency_id, opening_balance, balance, discount)
         VALUES (?1, ?2, ?3, ?3, ?4)
         ON CONFLICT (user_id, currency_id) DO UPDATE SET
             opening_balance = excluded.opening_balance,
             balance = excluded.balance,
             discount = excluded.discount",
    )
    .bind(user_id)
    .bind(currency_id)
    .bind(opening_balance)
    .bind(discount)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Adds `delta` to the balance, opening a zero account when missing.
pub async fn adjust_balance(
    conn: &mut SqliteConnection,
    user_id: i64,
    currency_id: i64,
    delta: Money,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO user_accounts (user_id, currency_id, opening_balance, balance, discount)
         VALUES (?1, ?2, 0, ?3, 0)
         ON CONFLICT (user_id, currency_id) DO UPDATE SET balance = balance + excluded.balance",
    )
    .bind(user_id)
    .bind(currency_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use forex_core::UserRole;

    fn customer(name: &str) -> User {
        let now = Utc::now();
        User {
            id: 0,
            name: name.to_string(),
            normalized_name: name.to_uppercase(),
            username: None,
            phone: Some("+998901234567".to_string()),
            email: None,
            role: UserRole::Customer,
            address: None,
            description: None,
            password_hash: None,
            profile_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_update_and_lookup() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();

        let id = insert(&mut conn, &customer("Ali")).await.unwrap();
        let mut user = get(&mut conn, id).await.unwrap();
        assert_eq!(user.role, UserRole::Customer);

        user.username = Some("ali".to_string());
        user.role = UserRole::Admin;
        update(&mut conn, &user).await.unwrap();

        let found = find_by_username(&mut conn, "ali").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(count_admins(&mut conn).await.unwrap(), 1);
        assert!(find_by_normalized_name(&mut conn, "ALI").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_filter_by_role_and_search() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();

        insert(&mut conn, &customer("Ali")).await.unwrap();
        insert(&mut conn, &customer("Vali")).await.unwrap();
        let mut supplier = customer("Zavod");
        supplier.role = UserRole::Supplier;
        insert(&mut conn, &supplier).await.unwrap();

        let request = FilteringRequest::default().with_filter("role", "customer");
        let customers = filter(&mut conn, &request).await.unwrap();
        assert_eq!(customers.len(), 2);

        let request = FilteringRequest {
            search: Some("vali".to_string()),
            ..Default::default()
        };
        let found = filter(&mut conn, &request).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Vali");
    }

    #[tokio::test]
    async fn test_account_balance_moves() {
        let db = test_support::database().await;
        let mut conn = db.acquire().await.unwrap();
        let (currency_id, ..) = test_support::seed_product(&mut conn).await;
        let user_id = insert(&mut conn, &customer("Ali")).await.unwrap();

        // Opens the account on first use
        adjust_balance(&mut conn, user_id, currency_id, Money::from_minor(-3000))
            .await
            .unwrap();
        adjust_balance(&mut conn, user_id, currency_id, Money::from_minor(1000))
            .await
            .unwrap();
        let account = find_account(&mut conn, user_id, currency_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Money::from_minor(-2000));

        upsert_account(
            &mut conn,
            user_id,
            currency_id,
            Money::from_minor(500),
            Money::zero(),
        )
        .await
        .unwrap();
        let accounts = list_accounts(&mut conn, user_id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].opening_balance, Money::from_minor(500));
        assert_eq!(accounts[0].balance, Money::from_minor(500));

        assert!(!has_history(&mut conn, user_id).await.unwrap());
        delete(&mut conn, user_id).await.unwrap();
        assert!(find_by_id(&mut conn, user_id).await.unwrap().is_none());
    }
}
