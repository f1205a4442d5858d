//! # Services
//!
//! One module per aggregate. Every mutating function is a transaction
//! script: it opens a transaction, validates, calls `forex-core` for the
//! math and `forex-db` for the rows, then commits.
//!
//! ## Transaction Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut tx = state.db.begin().await?;                                  │
//! │       │                                                                 │
//! │       ├── any `?` ──► tx dropped ──► ROLLBACK                           │
//! │       │                                                                 │
//! │       └── commit(tx) ──► COMMIT ──► best-effort storage cleanup         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! A service never acquires a second pool connection while it holds a
//! transaction; everything inside runs on `&mut tx`.

pub mod auth;
pub mod currency;
pub mod files;
pub mod lookup;
pub mod process;
pub mod product;
pub mod product_entry;
pub mod product_type;
pub mod sale;
pub mod semi_product;
pub mod shop;
pub mod transaction;
pub mod unit_measure;
pub mod user;

use sqlx::{Sqlite, Transaction};
use tracing::warn;

use forex_core::validation::is_temp_key;
use forex_db::{DbError, FilteringRequest};

use crate::error::ApiResult;
use crate::storage::FileStorage;

/// Commits a service transaction.
pub(crate) async fn commit(tx: Transaction<'static, Sqlite>) -> ApiResult<()> {
    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
    Ok(())
}

/// Validates a filtering request before it reaches SQL.
pub(crate) fn check_filter(request: &FilteringRequest) -> ApiResult<()> {
    request.validate()?;
    Ok(())
}

/// Final key for an image sent with an entity.
///
/// Blank means no image. A temp upload is moved to its permanent key; when
/// the move fails the temp key is kept so the entity still points at a
/// readable object.
pub(crate) async fn settle_image(storage: &dyn FileStorage, key: Option<&str>) -> Option<String> {
    let key = key.map(str::trim).filter(|k| !k.is_empty())?;
    if !is_temp_key(key) {
        return Some(key.to_string());
    }
    match storage.move_from_temp(key).await {
        Some(moved) => Some(moved),
        None => Some(key.to_string()),
    }
}

/// Deletes an image that is no longer referenced. Failures are logged only.
pub(crate) async fn discard_image(storage: &dyn FileStorage, key: Option<&str>) {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return;
    };
    if key.starts_with("http://") || key.starts_with("https://") {
        return;
    }
    if let Err(e) = storage.delete(key).await {
        warn!(key = %key, error = %e, "Failed to delete image");
    }
}

/// Public URL for a stored key; `None` stays `None`.
pub(crate) fn image_url(storage: &dyn FileStorage, key: Option<&str>) -> Option<String> {
    key.map(|k| storage.public_url(k)).filter(|url| !url.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the service and route tests.

    use std::sync::Arc;

    use chrono::Utc;
    use forex_core::{Money, User, UserRole};
    use forex_db::repository::user;
    use forex_db::{Database, DbConfig};

    use super::lookup;
    use crate::config::ApiConfig;
    use crate::storage::MemoryStorage;
    use crate::AppState;

    /// In-memory database plus in-memory storage.
    pub async fn state() -> (AppState, Arc<MemoryStorage>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let storage = Arc::new(MemoryStorage::default());
        let state = AppState::new(db, ApiConfig::for_tests(), storage.clone());
        (state, storage)
    }

    /// Ids of the lazily created defaults.
    pub struct Defaults {
        pub unit_measure_id: i64,
        pub currency_id: i64,
        pub shop_id: i64,
    }

    pub async fn defaults(state: &AppState) -> Defaults {
        let mut tx = state.db.begin().await.unwrap();
        let unit = lookup::default_unit_measure(&mut tx).await.unwrap();
        let currency = lookup::default_currency(&mut tx).await.unwrap();
        let shop = lookup::default_shop(&mut tx).await.unwrap();
        tx.commit().await.unwrap();
        Defaults {
            unit_measure_id: unit.id,
            currency_id: currency.id,
            shop_id: shop.id,
        }
    }

    pub async fn customer(state: &AppState, name: &str) -> i64 {
        person(state, name, UserRole::Customer).await
    }

    pub async fn person(state: &AppState, name: &str, role: UserRole) -> i64 {
        let now = Utc::now();
        let mut conn = state.db.acquire().await.unwrap();
        user::insert(
            &mut conn,
            &User {
                id: 0,
                name: name.to_string(),
                normalized_name: name.trim().to_uppercase(),
                username: None,
                phone: None,
                email: None,
                role,
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

    pub async fn balance(state: &AppState, user_id: i64, currency_id: i64) -> Money {
        let mut conn = state.db.acquire().await.unwrap();
        user::find_account(&mut conn, user_id, currency_id)
            .await
            .unwrap()
            .map(|a| a.balance)
            .unwrap_or_default()
    }
}
