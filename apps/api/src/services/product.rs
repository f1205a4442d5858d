//! Products and their types as one aggregate.
//!
//! ## Update Flow
//! ```text
//! UpdateProduct { id, code, name, image, types[] }
//!      │
//!      ├── image: temp upload ──► moved, old image scheduled for deletion
//!      │          blank       ──► path cleared, old image scheduled
//!      │
//!      ├── types missing from the request ──► cascade delete (Forbidden if sold)
//!      ├── types with an id               ──► updated, bundle size rules apply
//!      └── types without an id            ──► added
//!      │
//!      ▼
//! COMMIT ──► old image deleted (best effort)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use forex_core::validation::{
    is_blank, is_temp_key, normalize_name, validate_id, validate_name, validate_product_code,
};
use forex_core::{CoreError, Product, ProductType, ProductionOrigin, UnitMeasure};
use forex_db::repository::{currency, product, product_type, unit_measure};
use forex_db::FilteringRequest;

use super::product_type::{
    apply_update, delete_type_cascade, require_default_currency, ProductTypeDto, ProductTypeRequest,
};
use super::{check_filter, commit, discard_image, image_url, settle_image};
use crate::error::ApiResult;
use crate::storage::FileStorage;
use crate::AppState;

/// A product with its types, as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductRequest {
    pub id: i64,
    pub code: String,
    pub name: String,
    /// Storage key; a temp key is moved to permanent storage on save.
    pub image_path: Option<String>,
    pub unit_measure_id: i64,
    pub production_origin: ProductionOrigin,
    pub product_types: Vec<ProductTypeRequest>,
}

impl ProductRequest {
    fn validate(&self) -> ApiResult<()> {
        validate_name("name", &self.name)?;
        validate_product_code(&self.code)?;
        Ok(())
    }
}

/// Product as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    #[serde(flatten)]
    pub product: Product,
    pub image_url: Option<String>,
    pub unit_measure: Option<UnitMeasure>,
    pub product_types: Vec<ProductTypeDto>,
}

pub(crate) async fn to_dto(
    conn: &mut SqliteConnection,
    storage: &dyn FileStorage,
    product: Product,
) -> ApiResult<ProductDto> {
    let unit = unit_measure::find_by_id(&mut *conn, product.unit_measure_id).await?;
    let mut types = Vec::new();
    for pt in product_type::list_by_product(&mut *conn, product.id).await? {
        types.push(super::product_type::to_dto(&mut *conn, pt).await?);
    }
    Ok(ProductDto {
        image_url: image_url(storage, product.image_path.as_deref()),
        unit_measure: unit,
        product_types: types,
        product,
    })
}

/// Inserts a new type for a product from a validated request.
async fn insert_type(
    conn: &mut SqliteConnection,
    product_id: i64,
    default_currency_id: i64,
    request: &ProductTypeRequest,
) -> ApiResult<i64> {
    request.validate()?;
    let currency_id = match request.currency_id {
        Some(id) => currency::get(&mut *conn, id).await?.id,
        None => default_currency_id,
    };
    Ok(product_type::insert(
        &mut *conn,
        &ProductType {
            id: 0,
            product_id,
            type_name: request.type_name.trim().to_string(),
            bundle_item_count: request.bundle_item_count,
            unit_price: request.unit_price,
            currency_id,
        },
    )
    .await?)
}

pub async fn create_product(state: &AppState, request: ProductRequest) -> ApiResult<i64> {
    debug!(code = %request.code, name = %request.name, "Creating product");
    request.validate()?;
    let code = request.code.trim();

    let mut tx = state.db.begin().await?;

    if product::code_taken(&mut tx, code, None).await? {
        return Err(CoreError::already_exists("Product", "code", code).into());
    }
    let unit = unit_measure::get(&mut tx, request.unit_measure_id).await?;
    let default_currency = require_default_currency(&mut tx).await?;

    let image = settle_image(state.storage.as_ref(), request.image_path.as_deref()).await;

    let now = Utc::now();
    let id = product::insert(
        &mut tx,
        &Product {
            id: 0,
            code: code.to_string(),
            name: request.name.trim().to_string(),
            normalized_name: normalize_name(&request.name),
            image_path: image,
            unit_measure_id: unit.id,
            production_origin: request.production_origin,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    for pt in request
        .product_types
        .iter()
        .filter(|pt| !is_blank(Some(pt.type_name.as_str())))
    {
        insert_type(&mut tx, id, default_currency.id, pt).await?;
    }

    commit(tx).await?;
    info!(product_id = %id, code = %code, "Product created");
    Ok(id)
}

pub async fn update_product(state: &AppState, request: ProductRequest) -> ApiResult<()> {
    debug!(product_id = %request.id, "Updating product");
    validate_id("id", request.id)?;
    request.validate()?;
    let code = request.code.trim();

    let mut tx = state.db.begin().await?;

    let existing = product::get(&mut tx, request.id).await?;
    if product::code_taken(&mut tx, code, Some(existing.id)).await? {
        return Err(CoreError::already_exists("Product", "code", code).into());
    }
    let unit = unit_measure::get(&mut tx, request.unit_measure_id).await?;

    let mut stale_image = None;
    let image = match request.image_path.as_deref().map(str::trim) {
        None | Some("") => {
            stale_image = existing.image_path.clone();
            None
        }
        Some(key) if is_temp_key(key) => {
            stale_image = existing.image_path.clone();
            settle_image(state.storage.as_ref(), Some(key)).await
        }
        Some(key) => Some(key.to_string()),
    };

    product::update(
        &mut tx,
        &Product {
            code: code.to_string(),
            name: request.name.trim().to_string(),
            normalized_name: normalize_name(&request.name),
            image_path: image,
            unit_measure_id: unit.id,
            production_origin: request.production_origin,
            updated_at: Utc::now(),
            ..existing.clone()
        },
    )
    .await?;

    // Types the client dropped
    let incoming: Vec<i64> = request
        .product_types
        .iter()
        .filter(|pt| pt.id > 0)
        .map(|pt| pt.id)
        .collect();
    for current in product_type::list_by_product(&mut tx, existing.id).await? {
        if !incoming.contains(&current.id) {
            delete_type_cascade(&mut tx, &current).await?;
        }
    }

    let mut default_currency_id = None;
    for pt in &request.product_types {
        if pt.id > 0 {
            let current = product_type::get(&mut tx, pt.id).await?;
            if current.product_id != existing.id {
                return Err(CoreError::not_found("Product type", pt.id).into());
            }
            apply_update(&mut tx, &current, pt).await?;
        } else if !is_blank(Some(pt.type_name.as_str())) {
            let currency_id = match default_currency_id {
                Some(id) => id,
                None => {
                    let id = require_default_currency(&mut tx).await?.id;
                    default_currency_id = Some(id);
                    id
                }
            };
            insert_type(&mut tx, existing.id, currency_id, pt).await?;
        }
    }

    commit(tx).await?;
    info!(product_id = %existing.id, "Product updated");

    discard_image(state.storage.as_ref(), stale_image.as_deref()).await;
    Ok(())
}

/// Deletes a product with all of its types. Forbidden once any type was sold.
pub async fn delete_product(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(product_id = %id, "Deleting product");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;

    let existing = product::get(&mut tx, id).await?;
    if product::has_sales(&mut tx, id).await? {
        return Err(CoreError::Forbidden(format!(
            "product {} has sales and cannot be deleted",
            existing.code
        ))
        .into());
    }

    for pt in product_type::list_by_product(&mut tx, id).await? {
        delete_type_cascade(&mut tx, &pt).await?;
    }
    product::delete(&mut tx, id).await?;

    commit(tx).await?;
    info!(product_id = %id, code = %existing.code, "Product deleted");

    discard_image(state.storage.as_ref(), existing.image_path.as_deref()).await;
    Ok(())
}

pub async fn get_product(state: &AppState, id: i64) -> ApiResult<ProductDto> {
    validate_id("id", id)?;
    let mut conn = state.db.acquire().await?;
    let found = product::get(&mut conn, id).await?;
    to_dto(&mut conn, state.storage.as_ref(), found).await
}

pub async fn list_products(state: &AppState) -> ApiResult<Vec<ProductDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for p in product::list(&mut conn).await? {
        out.push(to_dto(&mut conn, state.storage.as_ref(), p).await?);
    }
    Ok(out)
}

pub async fn filter_products(
    state: &AppState,
    request: FilteringRequest,
) -> ApiResult<Vec<ProductDto>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for p in product::filter(&mut conn, &request).await? {
        out.push(to_dto(&mut conn, state.storage.as_ref(), p).await?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support;
    use forex_core::Money;

    fn type_request(id: i64, name: &str, bundle: i64) -> ProductTypeRequest {
        ProductTypeRequest {
            id,
            type_name: name.to_string(),
            bundle_item_count: bundle,
            unit_price: Money::from_minor(1_000),
            ..Default::default()
        }
    }

    fn request(unit_measure_id: i64, code: &str) -> ProductRequest {
        ProductRequest {
            code: code.to_string(),
            name: "Paxta shim".to_string(),
            unit_measure_id,
            product_types: vec![type_request(0, "24-29", 12), type_request(0, "30-35", 10)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_product_with_types() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let mut req = request(defaults.unit_measure_id, "101");
        req.product_types.push(type_request(0, "  ", 6));
        let id = create_product(&state, req).await.unwrap();

        let dto = get_product(&state, id).await.unwrap();
        assert_eq!(dto.product.code, "101");
        assert_eq!(dto.product.normalized_name, "PAXTA SHIM");
        // Blank type name skipped
        assert_eq!(dto.product_types.len(), 2);
        assert!(dto
            .product_types
            .iter()
            .all(|t| t.product_type.currency_id == defaults.currency_id));
    }

    #[tokio::test]
    async fn test_create_product_rejects_duplicate_code_and_bad_input() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        create_product(&state, request(defaults.unit_measure_id, "101"))
            .await
            .unwrap();
        let err = create_product(&state, request(defaults.unit_measure_id, "101"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);

        let mut req = request(defaults.unit_measure_id, "102");
        req.name = " ".to_string();
        let err = create_product(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut req = request(defaults.unit_measure_id, "103");
        req.product_types = vec![type_request(0, "24-29", 0)];
        let err = create_product(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = create_product(&state, request(999, "104")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_create_product_moves_temp_image() {
        let (state, storage) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        let temp = "uploads/temp/products/20250101/aaaaaaaaaaaa.png";
        storage.put(temp, Duration::from_secs(10));

        let mut req = request(defaults.unit_measure_id, "101");
        req.image_path = Some(temp.to_string());
        let id = create_product(&state, req).await.unwrap();

        let dto = get_product(&state, id).await.unwrap();
        assert_eq!(
            dto.product.image_path.as_deref(),
            Some("uploads/products/20250101/aaaaaaaaaaaa.png")
        );
        assert_eq!(
            dto.image_url.as_deref(),
            Some("http://files.test/forex/uploads/products/20250101/aaaaaaaaaaaa.png")
        );
        assert!(!storage.contains(temp));
    }

    #[tokio::test]
    async fn test_update_product_syncs_types_and_image() {
        let (state, storage) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let old_image = "uploads/products/20250101/bbbbbbbbbbbb.png";
        storage.put(old_image, Duration::from_secs(10));
        let mut req = request(defaults.unit_measure_id, "101");
        req.image_path = Some(old_image.to_string());
        let id = create_product(&state, req).await.unwrap();

        let before = get_product(&state, id).await.unwrap();
        let keep = before
            .product_types
            .iter()
            .find(|t| t.product_type.type_name == "24-29")
            .unwrap()
            .product_type
            .id;

        let new_image = "uploads/temp/products/20250102/cccccccccccc.png";
        storage.put(new_image, Duration::from_secs(10));

        update_product(
            &state,
            ProductRequest {
                id,
                code: "101A".to_string(),
                name: "Paxta shim".to_string(),
                image_path: Some(new_image.to_string()),
                unit_measure_id: defaults.unit_measure_id,
                production_origin: ProductionOrigin::Purchased,
                product_types: vec![type_request(keep, "24-29", 12), type_request(0, "36-41", 8)],
            },
        )
        .await
        .unwrap();

        let after = get_product(&state, id).await.unwrap();
        assert_eq!(after.product.code, "101A");
        assert_eq!(after.product.production_origin, ProductionOrigin::Purchased);
        let mut names: Vec<_> = after
            .product_types
            .iter()
            .map(|t| t.product_type.type_name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["24-29", "36-41"]);

        assert_eq!(
            after.product.image_path.as_deref(),
            Some("uploads/products/20250102/cccccccccccc.png")
        );
        assert!(!storage.contains(old_image));
    }

    #[tokio::test]
    async fn test_update_with_blank_image_clears_it() {
        let (state, storage) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        let old_image = "uploads/products/20250101/dddddddddddd.png";
        storage.put(old_image, Duration::from_secs(10));

        let mut req = request(defaults.unit_measure_id, "101");
        req.image_path = Some(old_image.to_string());
        let id = create_product(&state, req).await.unwrap();

        let mut req = request(defaults.unit_measure_id, "101");
        req.id = id;
        req.product_types.clear();
        update_product(&state, req).await.unwrap();

        let after = get_product(&state, id).await.unwrap();
        assert!(after.product.image_path.is_none());
        assert!(after.image_url.is_none());
        assert!(after.product_types.is_empty());
        assert!(!storage.contains(old_image));
    }

    #[tokio::test]
    async fn test_update_missing_product_is_not_found() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;

        let mut req = request(defaults.unit_measure_id, "101");
        req.id = 42;
        let err = update_product(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let mut req = request(defaults.unit_measure_id, "101");
        req.id = 0;
        let err = update_product(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_delete_product_removes_everything() {
        let (state, storage) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        let image = "uploads/products/20250101/eeeeeeeeeeee.png";
        storage.put(image, Duration::from_secs(10));

        let mut req = request(defaults.unit_measure_id, "101");
        req.image_path = Some(image.to_string());
        let id = create_product(&state, req).await.unwrap();

        delete_product(&state, id).await.unwrap();

        let err = get_product(&state, id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(!storage.contains(image));

        let err = delete_product(&state, id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    struct Sold {
        product_id: i64,
        sold_type: i64,
        other_type: i64,
    }

    /// Product "101" with 24 items of type 24-29 in stock, one bundle of them sold.
    async fn sold_product(state: &AppState) -> Sold {
        use crate::services::product_entry::{self, ProductEntryRequest};
        use crate::services::sale::{self, SaleItemRequest, SaleRequest};

        let defaults = test_support::defaults(state).await;
        let product_id = create_product(state, request(defaults.unit_measure_id, "101"))
            .await
            .unwrap();
        let dto = get_product(state, product_id).await.unwrap();
        let type_id = |name: &str| {
            dto.product_types
                .iter()
                .find(|t| t.product_type.type_name == name)
                .unwrap()
                .product_type
                .id
        };
        let (sold_type, other_type) = (type_id("24-29"), type_id("30-35"));

        product_entry::create_product_entry(
            state,
            ProductEntryRequest {
                count: 24,
                bundle_item_count: 12,
                unit_price: Money::from_minor(1_000),
                product: ProductRequest {
                    id: product_id,
                    product_types: vec![type_request(sold_type, "24-29", 12)],
                    ..request(defaults.unit_measure_id, "101")
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let customer = test_support::customer(state, "Mijoz").await;
        sale::create_sale(
            state,
            SaleRequest {
                customer_id: customer,
                items: vec![SaleItemRequest {
                    product_type_id: sold_type,
                    bundle_count: 1,
                    bundle_item_count: 12,
                    unit_price: Money::from_minor(1_200),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        Sold {
            product_id,
            sold_type,
            other_type,
        }
    }

    #[tokio::test]
    async fn test_delete_sold_product_is_forbidden() {
        let (state, _) = test_support::state().await;
        let sold = sold_product(&state).await;

        let err = delete_product(&state, sold.product_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let still = get_product(&state, sold.product_id).await.unwrap();
        assert_eq!(still.product_types.len(), 2);
    }

    #[tokio::test]
    async fn test_update_dropping_sold_type_is_forbidden_and_rolled_back() {
        let (state, _) = test_support::state().await;
        let sold = sold_product(&state).await;
        let unit_measure_id = get_product(&state, sold.product_id)
            .await
            .unwrap()
            .product
            .unit_measure_id;

        let err = update_product(
            &state,
            ProductRequest {
                id: sold.product_id,
                code: "101B".to_string(),
                name: "Renamed".to_string(),
                unit_measure_id,
                product_types: vec![type_request(sold.other_type, "30-35", 10)],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let after = get_product(&state, sold.product_id).await.unwrap();
        assert_eq!(after.product.code, "101");
        assert_eq!(after.product.name, "Paxta shim");
        assert!(after
            .product_types
            .iter()
            .any(|t| t.product_type.id == sold.sold_type));

        let mut conn = state.db.acquire().await.unwrap();
        let residues = forex_db::repository::residue::list_by_type(&mut conn, sold.sold_type)
            .await
            .unwrap();
        assert_eq!(residues[0].count, 12);
    }

    #[tokio::test]
    async fn test_filter_products_by_code() {
        let (state, _) = test_support::state().await;
        let defaults = test_support::defaults(&state).await;
        create_product(&state, request(defaults.unit_measure_id, "101"))
            .await
            .unwrap();
        create_product(&state, request(defaults.unit_measure_id, "202"))
            .await
            .unwrap();

        let found = filter_products(&state, FilteringRequest::default().with_filter("code", "202"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].product.code, "202");

        assert_eq!(list_products(&state).await.unwrap().len(), 2);
    }
}
