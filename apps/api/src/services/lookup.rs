//! Lazily created defaults: unit measure, currency and shop.
//!
//! The first stock entry on an empty database creates them; afterwards they
//! are found again by their default flag or their well-known name.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use forex_core::validation::normalize_name;
use forex_core::{
    Currency, Money, Shop, UnitMeasure, DEFAULT_CURRENCY_CODE, DEFAULT_CURRENCY_NAME,
    DEFAULT_SHOP_NAME, DEFAULT_UNIT_MEASURE_NAME, DEFAULT_UNIT_MEASURE_SYMBOL,
};
use forex_db::repository::{currency, shop, unit_measure};

use crate::error::ApiResult;

/// Id the first shop gets on a fresh database.
const FIRST_SHOP_ID: i64 = 1;

pub async fn default_unit_measure(conn: &mut SqliteConnection) -> ApiResult<UnitMeasure> {
    if let Some(unit) = unit_measure::find_default(&mut *conn).await? {
        return Ok(unit);
    }
    let normalized = normalize_name(DEFAULT_UNIT_MEASURE_NAME);
    if let Some(unit) = unit_measure::find_by_normalized_name(&mut *conn, &normalized).await? {
        return Ok(unit);
    }

    let mut unit = UnitMeasure {
        id: 0,
        name: DEFAULT_UNIT_MEASURE_NAME.to_string(),
        normalized_name: normalized,
        symbol: DEFAULT_UNIT_MEASURE_SYMBOL.to_string(),
        description: Some("Default unit of measure".to_string()),
        is_default: true,
        is_active: true,
        position: 1,
    };
    unit.id = unit_measure::insert(&mut *conn, &unit).await?;

    info!(unit_measure_id = %unit.id, "Default unit measure created");
    Ok(unit)
}

/// The default currency. A new one also gets a zero cash account in every
/// existing shop.
pub async fn default_currency(conn: &mut SqliteConnection) -> ApiResult<Currency> {
    if let Some(found) = currency::find_default(&mut *conn).await? {
        return Ok(found);
    }
    if let Some(found) = currency::find_by_code(&mut *conn, DEFAULT_CURRENCY_CODE).await? {
        return Ok(found);
    }

    let mut created = Currency {
        id: 0,
        code: DEFAULT_CURRENCY_CODE.to_string(),
        name: DEFAULT_CURRENCY_NAME.to_string(),
        normalized_name: normalize_name(DEFAULT_CURRENCY_NAME),
        symbol: Some("so'm".to_string()),
        exchange_rate: Money::from_minor(100),
        is_default: true,
        is_active: true,
    };
    created.id = currency::insert(&mut *conn, &created).await?;

    for shop_id in shop::list_ids(&mut *conn).await? {
        shop::open_cash_account(&mut *conn, shop_id, created.id).await?;
    }

    info!(currency_id = %created.id, "Default currency created");
    Ok(created)
}

/// The default shop. A new one gets a zero cash account per currency.
pub async fn default_shop(conn: &mut SqliteConnection) -> ApiResult<Shop> {
    if let Some(found) = shop::find_by_id(&mut *conn, FIRST_SHOP_ID).await? {
        return Ok(found);
    }
    let normalized = normalize_name(DEFAULT_SHOP_NAME);
    if let Some(found) = shop::find_by_normalized_name(&mut *conn, &normalized).await? {
        return Ok(found);
    }

    let mut created = Shop {
        id: 0,
        name: DEFAULT_SHOP_NAME.to_string(),
        normalized_name: normalized,
        created_at: Utc::now(),
    };
    created.id = shop::insert(&mut *conn, &created).await?;

    for currency_id in currency::list_ids(&mut *conn).await? {
        shop::open_cash_account(&mut *conn, created.id, currency_id).await?;
    }

    info!(shop_id = %created.id, "Default shop created");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;

    #[tokio::test]
    async fn test_defaults_are_created_once() {
        let (state, _) = test_support::state().await;

        let first = test_support::defaults(&state).await;
        let second = test_support::defaults(&state).await;

        assert_eq!(first.unit_measure_id, second.unit_measure_id);
        assert_eq!(first.currency_id, second.currency_id);
        assert_eq!(first.shop_id, second.shop_id);

        let mut conn = state.db.acquire().await.unwrap();
        assert_eq!(currency::list(&mut conn).await.unwrap().len(), 1);
        assert_eq!(shop::list(&mut conn).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_shop_gets_cash_account_in_default_currency() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let mut conn = state.db.acquire().await.unwrap();
        let account = shop::find_cash_account(&mut conn, defaults.shop_id, defaults.currency_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Money::zero());

        let currency = currency::get(&mut conn, defaults.currency_id).await.unwrap();
        assert_eq!(currency.code, "UZS");
        assert!(currency.is_default);
    }
}
