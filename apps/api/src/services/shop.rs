//! Shops and their cash boxes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use forex_core::validation::{normalize_name, validate_id, validate_name};
use forex_core::{CoreError, Shop, ShopCashAccount};
use forex_db::repository::{currency, shop};

use super::commit;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShopRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopDto {
    #[serde(flatten)]
    pub shop: Shop,
    pub cash_accounts: Vec<ShopCashAccount>,
}

/// Creates a shop with a zero cash account in every currency.
pub async fn create_shop(state: &AppState, request: ShopRequest) -> ApiResult<i64> {
    debug!(name = %request.name, "Creating shop");
    validate_name("name", &request.name)?;

    let normalized = normalize_name(&request.name);
    let mut tx = state.db.begin().await?;
    if shop::find_by_normalized_name(&mut tx, &normalized)
        .await?
        .is_some()
    {
        return Err(CoreError::already_exists("Shop", "name", &request.name).into());
    }

    let id = shop::insert(
        &mut tx,
        &Shop {
            id: 0,
            name: request.name.trim().to_string(),
            normalized_name: normalized,
            created_at: Utc::now(),
        },
    )
    .await?;
    for currency_id in currency::list_ids(&mut tx).await? {
        shop::open_cash_account(&mut tx, id, currency_id).await?;
    }

    commit(tx).await?;
    info!(shop_id = %id, "Shop created");
    Ok(id)
}

pub async fn list_shops(state: &AppState) -> ApiResult<Vec<ShopDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for found in shop::list(&mut conn).await? {
        let cash_accounts = shop::list_cash_accounts(&mut conn, found.id).await?;
        out.push(ShopDto {
            shop: found,
            cash_accounts,
        });
    }
    Ok(out)
}

/// Deletes a shop that never held stock, sales or cash movements.
pub async fn delete_shop(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(shop_id = %id, "Deleting shop");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let existing = shop::get(&mut tx, id).await?;
    if shop::has_activity(&mut tx, id).await? {
        return Err(CoreError::Forbidden(format!(
            "shop {} has stock, sales or cash movements",
            existing.name
        ))
        .into());
    }
    shop::delete(&mut tx, id).await?;

    commit(tx).await?;
    info!(shop_id = %id, "Shop deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support;
    use forex_core::Money;

    fn named(name: &str) -> ShopRequest {
        ShopRequest {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_shop_opens_accounts() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let id = create_shop(&state, named("Chilonzor")).await.unwrap();
        let shops = list_shops(&state).await.unwrap();
        let created = shops.iter().find(|s| s.shop.id == id).unwrap();

        assert_eq!(created.shop.normalized_name, "CHILONZOR");
        assert_eq!(created.cash_accounts.len(), 1);
        assert_eq!(created.cash_accounts[0].currency_id, defaults.currency_id);
        assert_eq!(created.cash_accounts[0].balance, Money::zero());
    }

    #[tokio::test]
    async fn test_duplicate_shop_name() {
        let (state, _) = test_support::state().await;
        create_shop(&state, named("Chilonzor")).await.unwrap();

        let err = create_shop(&state, named("chilonzor ")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);

        let err = create_shop(&state, named("  ")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_delete_shop_with_cash_is_forbidden() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        let customer = test_support::customer(&state, "Ali").await;

        let mut conn = state.db.acquire().await.unwrap();
        forex_db::repository::transaction::insert(
            &mut conn,
            &forex_core::Transaction {
                id: 0,
                date: Utc::now(),
                kind: forex_core::TransactionKind::Income,
                user_id: customer,
                shop_id: defaults.shop_id,
                currency_id: defaults.currency_id,
                amount: Money::from_minor(500),
                description: None,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let err = delete_shop(&state, defaults.shop_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let empty = create_shop(&state, named("Yunusobod")).await.unwrap();
        delete_shop(&state, empty).await.unwrap();
        assert_eq!(list_shops(&state).await.unwrap().len(), 1);

        let err = delete_shop(&state, empty).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
