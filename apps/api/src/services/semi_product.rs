//! Semi-products: raw materials bought in and consumed by production.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use forex_core::validation::{normalize_name, validate_amount, validate_count, validate_id, validate_name};
use forex_core::{CoreError, Money, SemiProduct, SemiProductEntry};
use forex_db::repository::{semi_product, unit_measure};

use super::lookup::default_unit_measure;
use super::{commit, image_url, settle_image};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemiProductRequest {
    pub name: String,
    /// Falls back to the default unit.
    pub unit_measure_id: Option<i64>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemiProductEntryRequest {
    pub semi_product_id: i64,
    pub quantity: i64,
    pub cost_price: Money,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemiProductDto {
    #[serde(flatten)]
    pub semi_product: SemiProduct,
    pub image_url: Option<String>,
    /// Unit cost of the latest purchase.
    pub latest_cost: Option<Money>,
    pub entries: Vec<SemiProductEntry>,
}

pub async fn create_semi_product(state: &AppState, request: SemiProductRequest) -> ApiResult<i64> {
    debug!(name = %request.name, "Creating semi-product");
    validate_name("name", &request.name)?;

    let normalized = normalize_name(&request.name);
    let mut tx = state.db.begin().await?;
    if semi_product::find_by_normalized_name(&mut tx, &normalized)
        .await?
        .is_some()
    {
        return Err(CoreError::already_exists("Semi-product", "name", &request.name).into());
    }
    let unit = match request.unit_measure_id {
        Some(id) => unit_measure::get(&mut tx, id).await?,
        None => default_unit_measure(&mut tx).await?,
    };

    let image = settle_image(state.storage.as_ref(), request.image_path.as_deref()).await;
    let id = semi_product::insert(
        &mut tx,
        &SemiProduct {
            id: 0,
            name: request.name.trim().to_string(),
            normalized_name: normalized,
            unit_measure_id: unit.id,
            image_path: image,
        },
    )
    .await?;

    commit(tx).await?;
    info!(semi_product_id = %id, "Semi-product created");
    Ok(id)
}

pub async fn list_semi_products(state: &AppState) -> ApiResult<Vec<SemiProductDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for semi in semi_product::list(&mut conn).await? {
        let entries = semi_product::list_entries(&mut conn, semi.id).await?;
        out.push(SemiProductDto {
            image_url: image_url(state.storage.as_ref(), semi.image_path.as_deref()),
            latest_cost: entries.first().map(|e| e.cost_price),
            entries,
            semi_product: semi,
        });
    }
    Ok(out)
}

/// Records a purchase. Its cost becomes the semi-product's current cost.
pub async fn create_semi_product_entry(
    state: &AppState,
    request: SemiProductEntryRequest,
) -> ApiResult<i64> {
    debug!(semi_product_id = %request.semi_product_id, quantity = %request.quantity, "Recording semi-product entry");
    validate_id("semi_product_id", request.semi_product_id)?;
    validate_count("quantity", request.quantity)?;
    validate_amount("cost_price", request.cost_price)?;

    let mut tx = state.db.begin().await?;
    semi_product::get(&mut tx, request.semi_product_id).await?;
    let id = semi_product::insert_entry(
        &mut tx,
        &SemiProductEntry {
            id: 0,
            semi_product_id: request.semi_product_id,
            quantity: request.quantity,
            cost_price: request.cost_price,
            date: request.date.unwrap_or_else(Utc::now),
        },
    )
    .await?;

    commit(tx).await?;
    info!(entry_id = %id, semi_product_id = %request.semi_product_id, "Semi-product entry recorded");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support;

    fn leather() -> SemiProductRequest {
        SemiProductRequest {
            name: "Charm".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_semi_product_uses_default_unit() {
        let (state, _) = test_support::state().await;
        let id = create_semi_product(&state, leather()).await.unwrap();
        let defaults = test_support::defaults(&state).await;

        let all = list_semi_products(&state).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].semi_product.id, id);
        assert_eq!(all[0].semi_product.unit_measure_id, defaults.unit_measure_id);
        assert_eq!(all[0].latest_cost, None);

        let err = create_semi_product(&state, leather()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_latest_entry_sets_cost() {
        let (state, _) = test_support::state().await;
        let id = create_semi_product(&state, leather()).await.unwrap();

        let now = Utc::now();
        for (age_days, cost) in [(3, 900), (1, 1_100)] {
            create_semi_product_entry(
                &state,
                SemiProductEntryRequest {
                    semi_product_id: id,
                    quantity: 10,
                    cost_price: Money::from_minor(cost),
                    date: Some(now - Duration::days(age_days)),
                },
            )
            .await
            .unwrap();
        }

        let all = list_semi_products(&state).await.unwrap();
        assert_eq!(all[0].entries.len(), 2);
        assert_eq!(all[0].latest_cost, Some(Money::from_minor(1_100)));
    }

    #[tokio::test]
    async fn test_entry_validation() {
        let (state, _) = test_support::state().await;
        let id = create_semi_product(&state, leather()).await.unwrap();

        let zero_quantity = SemiProductEntryRequest {
            semi_product_id: id,
            quantity: 0,
            cost_price: Money::from_minor(100),
            date: None,
        };
        let err = create_semi_product_entry(&state, zero_quantity).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let negative_cost = SemiProductEntryRequest {
            semi_product_id: id,
            quantity: 1,
            cost_price: Money::from_minor(-1),
            date: None,
        };
        let err = create_semi_product_entry(&state, negative_cost).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let unknown = SemiProductEntryRequest {
            semi_product_id: id + 100,
            quantity: 1,
            cost_price: Money::zero(),
            date: None,
        };
        let err = create_semi_product_entry(&state, unknown).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
