//! Product types (variants), their bill of materials and their residues.
//!
//! ## Bundle Size Changes
//! ```text
//! bundle_item_count 12 ──► 10
//!      │
//!      ├── type has sale items? ──► Forbidden
//!      │
//!      ├── every entry: bundles = count / 12, count = bundles × 10,
//!      │                total_amount = count × unit_price
//!      │
//!      └── every residue of the type: entries − sales
//! ```

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use forex_core::stock::rebundle_entry;
use forex_core::validation::{
    validate_bundle_item_count, validate_count, validate_id, validate_name, validate_unit_price,
};
use forex_core::{CoreError, Currency, Money, ProductResidue, ProductType, ProductTypeItem};
use forex_db::repository::{currency, product, product_entry, product_type, residue, semi_product};
use forex_db::FilteringRequest;

use super::{check_filter, commit};
use crate::error::ApiResult;
use crate::AppState;

// =============================================================================
// Requests
// =============================================================================

/// A product type as sent by the client, inside a product or on its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductTypeRequest {
    /// `0` for a new type.
    pub id: i64,
    pub product_id: i64,
    #[serde(rename = "type")]
    pub type_name: String,
    pub bundle_item_count: i64,
    pub unit_price: Money,
    pub currency_id: Option<i64>,
}

impl ProductTypeRequest {
    pub(crate) fn validate(&self) -> ApiResult<()> {
        validate_name("type", &self.type_name)?;
        validate_bundle_item_count(self.bundle_item_count)?;
        validate_unit_price(self.unit_price)?;
        Ok(())
    }
}

/// One line of a bill of materials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeItemRequest {
    pub semi_product_id: i64,
    pub quantity: i64,
}

/// A product type with its stock per shop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeDto {
    #[serde(flatten)]
    pub product_type: ProductType,
    pub residues: Vec<ProductResidue>,
}

// =============================================================================
// Shared rules
// =============================================================================

/// The currency new types are priced in.
pub(crate) async fn require_default_currency(conn: &mut SqliteConnection) -> ApiResult<Currency> {
    if let Some(found) = currency::find_default(&mut *conn).await? {
        return Ok(found);
    }
    currency::find_by_code(&mut *conn, forex_core::DEFAULT_CURRENCY_CODE)
        .await?
        .ok_or_else(|| CoreError::not_found("Currency", "default").into())
}

/// Moves every historical entry of a type to a new bundle size and rebuilds
/// the type's residues. No-op when the size is unchanged.
pub(crate) async fn change_bundle_size(
    conn: &mut SqliteConnection,
    existing: &ProductType,
    new_bundle_item_count: i64,
) -> ApiResult<()> {
    if existing.bundle_item_count == new_bundle_item_count {
        return Ok(());
    }
    validate_bundle_item_count(new_bundle_item_count)?;

    if product_type::has_sales(&mut *conn, existing.id).await? {
        return Err(CoreError::Forbidden(format!(
            "product type {} has sales, its bundle size cannot change",
            existing.type_name
        ))
        .into());
    }

    let entries = product_entry::list_by_type(&mut *conn, existing.id).await?;
    for entry in &entries {
        let rebundled = rebundle_entry(
            entry.count,
            entry.bundle_item_count,
            new_bundle_item_count,
            entry.unit_price,
        )?;
        product_entry::update_bundle(
            &mut *conn,
            entry.id,
            rebundled.count,
            new_bundle_item_count,
            rebundled.total_amount,
        )
        .await?;
    }

    for r in residue::list_by_type(&mut *conn, existing.id).await? {
        residue::recompute(&mut *conn, r.id).await?;
    }

    debug!(
        product_type_id = %existing.id,
        old = existing.bundle_item_count,
        new = new_bundle_item_count,
        entries = entries.len(),
        "Bundle size changed"
    );
    Ok(())
}

/// Deletes a type and everything hanging off it. Forbidden once it was sold.
pub(crate) async fn delete_type_cascade(
    conn: &mut SqliteConnection,
    existing: &ProductType,
) -> ApiResult<()> {
    if product_type::has_sales(&mut *conn, existing.id).await? {
        return Err(CoreError::Forbidden(format!(
            "product type {} has sales and cannot be deleted",
            existing.type_name
        ))
        .into());
    }
    product_type::delete_cascade(&mut *conn, existing.id).await?;
    Ok(())
}

/// Applies a request to an existing type: bundle size first, then the rest.
pub(crate) async fn apply_update(
    conn: &mut SqliteConnection,
    existing: &ProductType,
    request: &ProductTypeRequest,
) -> ApiResult<ProductType> {
    request.validate()?;
    change_bundle_size(&mut *conn, existing, request.bundle_item_count).await?;

    let currency_id = match request.currency_id {
        Some(id) => currency::get(&mut *conn, id).await?.id,
        None => existing.currency_id,
    };

    let updated = ProductType {
        id: existing.id,
        product_id: existing.product_id,
        type_name: request.type_name.trim().to_string(),
        bundle_item_count: request.bundle_item_count,
        unit_price: request.unit_price,
        currency_id,
    };
    product_type::update(&mut *conn, &updated).await?;
    Ok(updated)
}

pub(crate) async fn to_dto(conn: &mut SqliteConnection, pt: ProductType) -> ApiResult<ProductTypeDto> {
    let residues = residue::list_by_type(&mut *conn, pt.id).await?;
    Ok(ProductTypeDto {
        product_type: pt,
        residues,
    })
}

// =============================================================================
// Operations
// =============================================================================

/// Adds a variant to an existing product.
pub async fn create_product_type(state: &AppState, request: ProductTypeRequest) -> ApiResult<i64> {
    debug!(product_id = %request.product_id, type_name = %request.type_name, "Creating product type");
    validate_id("product_id", request.product_id)?;
    request.validate()?;

    let mut tx = state.db.begin().await?;

    product::get(&mut tx, request.product_id).await?;
    let type_name = request.type_name.trim();
    if product_type::find_by_name(&mut tx, request.product_id, type_name)
        .await?
        .is_some()
    {
        return Err(CoreError::already_exists("Product type", "type", type_name).into());
    }

    let currency_id = match request.currency_id {
        Some(id) => currency::get(&mut tx, id).await?.id,
        None => require_default_currency(&mut tx).await?.id,
    };

    let id = product_type::insert(
        &mut tx,
        &ProductType {
            id: 0,
            product_id: request.product_id,
            type_name: type_name.to_string(),
            bundle_item_count: request.bundle_item_count,
            unit_price: request.unit_price,
            currency_id,
        },
    )
    .await?;

    commit(tx).await?;
    info!(product_type_id = %id, product_id = %request.product_id, "Product type created");
    Ok(id)
}

pub async fn update_product_type(state: &AppState, request: ProductTypeRequest) -> ApiResult<()> {
    debug!(product_type_id = %request.id, "Updating product type");
    validate_id("id", request.id)?;

    let mut tx = state.db.begin().await?;

    let existing = product_type::get(&mut tx, request.id).await?;
    let type_name = request.type_name.trim();
    if let Some(other) = product_type::find_by_name(&mut tx, existing.product_id, type_name).await? {
        if other.id != existing.id {
            return Err(CoreError::already_exists("Product type", "type", type_name).into());
        }
    }
    apply_update(&mut tx, &existing, &request).await?;

    commit(tx).await?;
    info!(product_type_id = %request.id, "Product type updated");
    Ok(())
}

/// Deletes a type with its entries, residues, queue rows and bill of materials.
pub async fn delete_product_type(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(product_type_id = %id, "Deleting product type");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let existing = product_type::get(&mut tx, id).await?;
    delete_type_cascade(&mut tx, &existing).await?;
    commit(tx).await?;

    info!(product_type_id = %id, "Product type deleted");
    Ok(())
}

/// Replaces the bill of materials of a type.
pub async fn set_type_items(
    state: &AppState,
    product_type_id: i64,
    items: Vec<TypeItemRequest>,
) -> ApiResult<Vec<ProductTypeItem>> {
    debug!(product_type_id = %product_type_id, items = items.len(), "Setting bill of materials");
    validate_id("product_type_id", product_type_id)?;

    let mut pairs: Vec<(i64, i64)> = Vec::with_capacity(items.len());
    for item in &items {
        validate_id("semi_product_id", item.semi_product_id)?;
        validate_count("quantity", item.quantity)?;
        if pairs.iter().any(|(semi, _)| *semi == item.semi_product_id) {
            return Err(CoreError::Rule(format!(
                "semi product {} is listed twice",
                item.semi_product_id
            ))
            .into());
        }
        pairs.push((item.semi_product_id, item.quantity));
    }

    let mut tx = state.db.begin().await?;
    product_type::get(&mut tx, product_type_id).await?;
    for (semi_id, _) in &pairs {
        semi_product::get(&mut tx, *semi_id).await?;
    }
    product_type::replace_items(&mut tx, product_type_id, &pairs).await?;
    let saved = product_type::list_items(&mut tx, product_type_id).await?;
    commit(tx).await?;

    info!(product_type_id = %product_type_id, items = saved.len(), "Bill of materials replaced");
    Ok(saved)
}

pub async fn list_product_types(state: &AppState) -> ApiResult<Vec<ProductTypeDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for pt in product_type::list(&mut conn).await? {
        out.push(to_dto(&mut conn, pt).await?);
    }
    Ok(out)
}

pub async fn filter_product_types(
    state: &AppState,
    request: FilteringRequest,
) -> ApiResult<Vec<ProductTypeDto>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for pt in product_type::filter(&mut conn, &request).await? {
        out.push(to_dto(&mut conn, pt).await?);
    }
    Ok(out)
}

pub async fn list_residues(state: &AppState) -> ApiResult<Vec<ProductResidue>> {
    let mut conn = state.db.acquire().await?;
    Ok(residue::list(&mut conn).await?)
}

pub async fn filter_residues(
    state: &AppState,
    request: FilteringRequest,
) -> ApiResult<Vec<ProductResidue>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    Ok(residue::filter(&mut conn, &request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::product_entry::{self, ProductEntryRequest};
    use crate::services::sale::{self, SaleItemRequest, SaleRequest};
    use crate::services::test_support;

    async fn product_with_stock(state: &AppState) -> (i64, i64) {
        let entry_id = product_entry::create_product_entry(
            state,
            ProductEntryRequest::for_new_type("101", "Shim", "24-29", 36, 12, Money::from_minor(500)),
        )
        .await
        .unwrap();
        let mut conn = state.db.acquire().await.unwrap();
        let entry = forex_db::repository::product_entry::get(&mut conn, entry_id)
            .await
            .unwrap();
        let pt = product_type::get(&mut conn, entry.product_type_id).await.unwrap();
        (pt.product_id, pt.id)
    }

    #[tokio::test]
    async fn test_create_type_on_existing_product() {
        let (state, _) = test_support::state().await;
        let (product_id, _) = product_with_stock(&state).await;

        let id = create_product_type(
            &state,
            ProductTypeRequest {
                product_id,
                type_name: "30-35".to_string(),
                bundle_item_count: 10,
                unit_price: Money::from_minor(700),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let pt = product_type::get(&mut conn, id).await.unwrap();
        assert_eq!(pt.type_name, "30-35");
        assert_eq!(pt.bundle_item_count, 10);
    }

    #[tokio::test]
    async fn test_duplicate_type_name_is_rejected() {
        let (state, _) = test_support::state().await;
        let (product_id, _) = product_with_stock(&state).await;

        let err = create_product_type(
            &state,
            ProductTypeRequest {
                product_id,
                type_name: "24-29".to_string(),
                bundle_item_count: 12,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_bundle_change_rebundles_entries_and_residue() {
        let (state, _) = test_support::state().await;
        let (product_id, type_id) = product_with_stock(&state).await;

        update_product_type(
            &state,
            ProductTypeRequest {
                id: type_id,
                product_id,
                type_name: "24-29".to_string(),
                bundle_item_count: 10,
                unit_price: Money::from_minor(500),
                currency_id: None,
            },
        )
        .await
        .unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let entries = forex_db::repository::product_entry::list_by_type(&mut conn, type_id)
            .await
            .unwrap();
        // 36 items = 3 bundles of 12 ──► 3 bundles of 10
        assert_eq!(entries[0].count, 30);
        assert_eq!(entries[0].bundle_item_count, 10);
        assert_eq!(entries[0].total_amount, Money::from_minor(15_000));

        let residues = residue::list_by_type(&mut conn, type_id).await.unwrap();
        assert_eq!(residues[0].count, 30);
    }

    #[tokio::test]
    async fn test_sold_type_cannot_change_bundle_or_be_deleted() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        let (product_id, type_id) = product_with_stock(&state).await;
        let customer = test_support::customer(&state, "Mijoz").await;

        sale::create_sale(
            &state,
            SaleRequest {
                customer_id: customer,
                shop_id: Some(defaults.shop_id),
                items: vec![SaleItemRequest {
                    product_type_id: type_id,
                    bundle_count: 1,
                    bundle_item_count: 12,
                    unit_price: Money::from_minor(600),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = update_product_type(
            &state,
            ProductTypeRequest {
                id: type_id,
                product_id,
                type_name: "24-29".to_string(),
                bundle_item_count: 6,
                unit_price: Money::from_minor(500),
                currency_id: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let err = delete_product_type(&state, type_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        // Price changes stay allowed
        update_product_type(
            &state,
            ProductTypeRequest {
                id: type_id,
                product_id,
                type_name: "24-29".to_string(),
                bundle_item_count: 12,
                unit_price: Money::from_minor(550),
                currency_id: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_delete_type_cascades() {
        let (state, _) = test_support::state().await;
        let (product_id, type_id) = product_with_stock(&state).await;

        delete_product_type(&state, type_id).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        assert!(product_type::find_by_id(&mut conn, type_id).await.unwrap().is_none());
        assert!(residue::list_by_type(&mut conn, type_id).await.unwrap().is_empty());
        assert!(forex_db::repository::product_entry::list_by_type(&mut conn, type_id)
            .await
            .unwrap()
            .is_empty());
        // The product itself stays
        assert!(product::find_by_id(&mut conn, product_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_type_items_replaces_bill_of_materials() {
        let (state, _) = test_support::state().await;
        let (_, type_id) = product_with_stock(&state).await;
        let defaults = test_support::defaults(&state).await;

        let mut conn = state.db.acquire().await.unwrap();
        let cloth = semi_product::insert(
            &mut conn,
            &forex_core::SemiProduct {
                id: 0,
                name: "Mato".to_string(),
                normalized_name: "MATO".to_string(),
                unit_measure_id: defaults.unit_measure_id,
                image_path: None,
            },
        )
        .await
        .unwrap();
        drop(conn);

        let saved = set_type_items(
            &state,
            type_id,
            vec![TypeItemRequest {
                semi_product_id: cloth,
                quantity: 2,
            }],
        )
        .await
        .unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].quantity, 2);

        let err = set_type_items(
            &state,
            type_id,
            vec![
                TypeItemRequest { semi_product_id: cloth, quantity: 1 },
                TypeItemRequest { semi_product_id: cloth, quantity: 3 },
            ],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }
}
