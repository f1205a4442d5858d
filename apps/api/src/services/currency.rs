//! Currencies. Exactly one of them is the default.

use serde::Deserialize;
use tracing::{debug, info};

use forex_core::validation::{normalize_name, validate_id, validate_name, validate_required};
use forex_core::{CoreError, Currency, Money, ValidationError};
use forex_db::repository::{currency, shop};

use super::commit;
use crate::error::ApiResult;
use crate::AppState;

const MAX_CODE_LENGTH: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrencyRequest {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
    pub exchange_rate: Money,
    pub is_default: bool,
    pub is_active: bool,
}

impl CurrencyRequest {
    fn validate(&self) -> ApiResult<String> {
        let code = self.code.trim().to_uppercase();
        validate_required("code", &code)?;
        if code.chars().count() > MAX_CODE_LENGTH {
            return Err(ValidationError::TooLong {
                field: "code".to_string(),
                max: MAX_CODE_LENGTH,
            }
            .into());
        }
        validate_name("name", &self.name)?;
        if !self.exchange_rate.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "exchange_rate".to_string(),
            }
            .into());
        }
        Ok(code)
    }

    fn to_currency(&self, id: i64, code: String) -> Currency {
        Currency {
            id,
            code,
            name: self.name.trim().to_string(),
            normalized_name: normalize_name(&self.name),
            symbol: self
                .symbol
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            exchange_rate: self.exchange_rate,
            is_default: self.is_default,
            is_active: self.is_active || self.is_default,
        }
    }
}

/// Creates a currency and a zero cash account for it in every shop.
pub async fn create_currency(state: &AppState, request: CurrencyRequest) -> ApiResult<i64> {
    debug!(code = %request.code, "Creating currency");
    let code = request.validate()?;

    let mut tx = state.db.begin().await?;
    if currency::find_by_code(&mut tx, &code).await?.is_some() {
        return Err(CoreError::already_exists("Currency", "code", &code).into());
    }

    // The first currency is the default whatever the request says.
    let first = currency::find_default(&mut tx).await?.is_none();
    let mut created = request.to_currency(0, code);
    created.is_default |= first;
    created.is_active |= created.is_default;
    let id = currency::insert(&mut tx, &created).await?;
    if created.is_default {
        currency::clear_default_except(&mut tx, id).await?;
    }

    for shop_id in shop::list_ids(&mut tx).await? {
        shop::open_cash_account(&mut tx, shop_id, id).await?;
    }

    commit(tx).await?;
    info!(currency_id = %id, code = %created.code, "Currency created");
    Ok(id)
}

pub async fn update_currency(state: &AppState, request: CurrencyRequest) -> ApiResult<()> {
    debug!(currency_id = %request.id, "Updating currency");
    validate_id("id", request.id)?;
    let code = request.validate()?;

    let mut tx = state.db.begin().await?;
    let existing = currency::get(&mut tx, request.id).await?;
    if let Some(other) = currency::find_by_code(&mut tx, &code).await? {
        if other.id != existing.id {
            return Err(CoreError::already_exists("Currency", "code", &code).into());
        }
    }
    if existing.is_default && !request.is_default {
        return Err(CoreError::Rule(
            "mark another currency as default instead of clearing the flag".to_string(),
        )
        .into());
    }

    let updated = request.to_currency(existing.id, code);
    currency::update(&mut tx, &updated).await?;
    if updated.is_default {
        currency::clear_default_except(&mut tx, updated.id).await?;
    }

    commit(tx).await?;
    info!(currency_id = %updated.id, is_default = updated.is_default, "Currency updated");
    Ok(())
}

pub async fn list_currencies(state: &AppState) -> ApiResult<Vec<Currency>> {
    let mut conn = state.db.acquire().await?;
    Ok(currency::list(&mut conn).await?)
}

/// Deletes an unused, non-default currency together with its zero accounts.
pub async fn delete_currency(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(currency_id = %id, "Deleting currency");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let existing = currency::get(&mut tx, id).await?;
    if existing.is_default {
        return Err(CoreError::Forbidden("the default currency cannot be deleted".to_string()).into());
    }
    if currency::is_in_use(&mut tx, id).await? {
        return Err(CoreError::Forbidden(format!("currency {} is in use", existing.code)).into());
    }
    currency::delete(&mut tx, id).await?;

    commit(tx).await?;
    info!(currency_id = %id, "Currency deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support;

    fn usd(is_default: bool) -> CurrencyRequest {
        CurrencyRequest {
            code: "usd".to_string(),
            name: "Dollar".to_string(),
            symbol: Some("$".to_string()),
            exchange_rate: Money::from_minor(1_250_000),
            is_default,
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_currency_opens_shop_accounts() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let id = create_currency(&state, usd(false)).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let created = currency::get(&mut conn, id).await.unwrap();
        assert_eq!(created.code, "USD");
        assert!(!created.is_default);
        assert!(shop::find_cash_account(&mut conn, defaults.shop_id, id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_single_default_is_kept() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let id = create_currency(&state, usd(true)).await.unwrap();
        let all = list_currencies(&state).await.unwrap();
        let flagged: Vec<i64> = all.iter().filter(|c| c.is_default).map(|c| c.id).collect();
        assert_eq!(flagged, vec![id]);

        let mut back = usd(false);
        back.id = id;
        let err = update_currency(&state, back).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        let mut conn = state.db.acquire().await.unwrap();
        let uzs = currency::get(&mut conn, defaults.currency_id).await.unwrap();
        drop(conn);
        update_currency(
            &state,
            CurrencyRequest {
                id: uzs.id,
                code: uzs.code,
                name: uzs.name,
                symbol: uzs.symbol,
                exchange_rate: uzs.exchange_rate,
                is_default: true,
                is_active: true,
            },
        )
        .await
        .unwrap();

        let all = list_currencies(&state).await.unwrap();
        let flagged: Vec<i64> = all.iter().filter(|c| c.is_default).map(|c| c.id).collect();
        assert_eq!(flagged, vec![defaults.currency_id]);
    }

    #[tokio::test]
    async fn test_duplicate_code_and_bad_rate() {
        let (state, _) = test_support::state().await;
        create_currency(&state, usd(false)).await.unwrap();

        let err = create_currency(&state, usd(false)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);

        let mut zero = usd(false);
        zero.code = "EUR".to_string();
        zero.exchange_rate = Money::zero();
        let err = create_currency(&state, zero).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_delete_currency_rules() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        let id = create_currency(&state, usd(false)).await.unwrap();

        let err = delete_currency(&state, defaults.currency_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        delete_currency(&state, id).await.unwrap();
        let mut conn = state.db.acquire().await.unwrap();
        assert!(currency::find_by_id(&mut conn, id).await.unwrap().is_none());
        assert!(shop::find_cash_account(&mut conn, defaults.shop_id, id)
            .await
            .unwrap()
            .is_none());
    }
}
