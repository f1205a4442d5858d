//! Cash movements.
//!
//! ```text
//! Income  (user pays the shop):   user balance += amount, shop cash += amount
//! Expense (shop pays the user):   user balance -= amount, shop cash -= amount
//! ```
//! An update reverts the stored movement and applies the new one in the same
//! database transaction; a delete only reverts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use forex_core::validation::{validate_id, validate_name};
use forex_core::{Money, Transaction, TransactionKind, ValidationError};
use forex_db::repository::{currency, shop, transaction, user};
use forex_db::FilteringRequest;

use super::lookup::{default_currency, default_shop};
use super::{check_filter, commit};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub kind: TransactionKind,
    pub user_id: i64,
    #[serde(default)]
    pub shop_id: Option<i64>,
    #[serde(default)]
    pub currency_id: Option<i64>,
    pub amount: Money,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub user_name: Option<String>,
}

/// Moves the balances for `movement`; `direction` is 1 to apply, -1 to revert.
async fn post(conn: &mut SqliteConnection, movement: &Transaction, direction: i64) -> ApiResult<()> {
    let delta = movement.amount * (movement.kind.sign() * direction);
    user::adjust_balance(&mut *conn, movement.user_id, movement.currency_id, delta).await?;
    shop::adjust_cash_balance(&mut *conn, movement.shop_id, movement.currency_id, delta).await?;
    Ok(())
}

/// Resolves and checks a request into a row ready to insert or update.
async fn build(conn: &mut SqliteConnection, request: &TransactionRequest) -> ApiResult<Transaction> {
    validate_id("user_id", request.user_id)?;
    if !request.amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(text) = description {
        validate_name("description", text)?;
    }

    let user_id = user::get(&mut *conn, request.user_id).await?.id;
    let shop_id = match request.shop_id {
        Some(id) => shop::get(&mut *conn, id).await?.id,
        None => default_shop(&mut *conn).await?.id,
    };
    let currency_id = match request.currency_id {
        Some(id) => currency::get(&mut *conn, id).await?.id,
        None => default_currency(&mut *conn).await?.id,
    };

    let now = Utc::now();
    Ok(Transaction {
        id: request.id,
        date: request.date.unwrap_or(now),
        kind: request.kind,
        user_id,
        shop_id,
        currency_id,
        amount: request.amount,
        description: description.map(str::to_string),
        created_at: now,
    })
}

async fn to_dto(conn: &mut SqliteConnection, found: Transaction) -> ApiResult<TransactionDto> {
    let user_name = user::find_by_id(&mut *conn, found.user_id)
        .await?
        .map(|u| u.name);
    Ok(TransactionDto {
        transaction: found,
        user_name,
    })
}

pub async fn create_transaction(state: &AppState, request: TransactionRequest) -> ApiResult<i64> {
    debug!(kind = ?request.kind, user_id = %request.user_id, amount = %request.amount, "Creating transaction");

    let mut tx = state.db.begin().await?;
    let mut movement = build(&mut tx, &request).await?;
    movement.id = transaction::insert(&mut tx, &movement).await?;
    post(&mut tx, &movement, 1).await?;

    commit(tx).await?;
    info!(transaction_id = %movement.id, kind = ?movement.kind, "Transaction created");
    Ok(movement.id)
}

pub async fn update_transaction(state: &AppState, request: TransactionRequest) -> ApiResult<()> {
    debug!(transaction_id = %request.id, "Updating transaction");
    validate_id("id", request.id)?;

    let mut tx = state.db.begin().await?;
    let existing = transaction::get(&mut tx, request.id).await?;
    post(&mut tx, &existing, -1).await?;

    let movement = Transaction {
        created_at: existing.created_at,
        ..build(&mut tx, &request).await?
    };
    transaction::update(&mut tx, &movement).await?;
    post(&mut tx, &movement, 1).await?;

    commit(tx).await?;
    info!(transaction_id = %movement.id, "Transaction updated");
    Ok(())
}

pub async fn delete_transaction(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(transaction_id = %id, "Deleting transaction");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let existing = transaction::get(&mut tx, id).await?;
    post(&mut tx, &existing, -1).await?;
    transaction::delete(&mut tx, id).await?;

    commit(tx).await?;
    info!(transaction_id = %id, "Transaction deleted");
    Ok(())
}

pub async fn list_transactions(state: &AppState) -> ApiResult<Vec<TransactionDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for found in transaction::list(&mut conn).await? {
        out.push(to_dto(&mut conn, found).await?);
    }
    Ok(out)
}

pub async fn filter_transactions(
    state: &AppState,
    request: FilteringRequest,
) -> ApiResult<Vec<TransactionDto>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for found in transaction::filter(&mut conn, &request).await? {
        out.push(to_dto(&mut conn, found).await?);
    }
    Ok(out)
}
