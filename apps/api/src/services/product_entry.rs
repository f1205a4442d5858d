//! Stock entries: the get-or-create cascade behind "goods arrived".
//!
//! ## Create Flow (one transaction)
//! ```text
//! ProductEntryRequest
//!      │
//!      ├── defaults: currency ──► shop ──► unit measure (created when missing)
//!      ├── product: by id ──► by code ──► create (code + name required)
//!      ├── type:    by id ──► by name ──► create (type required)
//!      ├── type bundle size + price, product origin ◄── request
//!      ├── production queue: existing type and enough queued ──► deducted
//!      ├── residue (type, shop): created or incremented
//!      ├── cost price: Σ latest semi-product cost × quantity
//!      └── entry inserted, total = count × unit price
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use forex_core::stock::{components_cost, line_total, take_from_process, ComponentCost};
use forex_core::validation::{
    is_blank, normalize_name, validate_amount, validate_bundle_item_count, validate_count,
    validate_id, validate_name, validate_product_code, validate_unit_price,
};
use forex_core::{CoreError, Money, Product, ProductEntry, ProductType, ProductionOrigin};
use forex_db::repository::{
    process, product, product_entry, product_type, residue, semi_product, shop,
};
use forex_db::FilteringRequest;

use super::lookup::{default_currency, default_shop, default_unit_measure};
use super::product::ProductRequest;
use super::{check_filter, commit, settle_image};
use crate::error::ApiResult;
use crate::storage::{FileStorage, UploadUrl};
use crate::AppState;

/// Folder product images are uploaded to.
pub const PRODUCT_IMAGE_FOLDER: &str = "products";

/// A stock entry as sent by the client.
///
/// `product.product_types[0]` names the type the goods belong to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductEntryRequest {
    /// Entry being replaced; only read by update.
    pub id: i64,
    pub date: Option<DateTime<Utc>>,
    /// Items received.
    pub count: i64,
    pub bundle_item_count: i64,
    pub preparation_cost_per_unit: Money,
    pub unit_price: Money,
    pub production_origin: ProductionOrigin,
    /// Receiving shop; the default shop when absent.
    pub shop_id: Option<i64>,
    pub product: ProductRequest,
}

impl ProductEntryRequest {
    fn validate(&self) -> ApiResult<()> {
        validate_count("count", self.count)?;
        validate_bundle_item_count(self.bundle_item_count)?;
        validate_unit_price(self.unit_price)?;
        validate_amount("preparation_cost_per_unit", self.preparation_cost_per_unit)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_new_type(
        code: &str,
        name: &str,
        type_name: &str,
        count: i64,
        bundle_item_count: i64,
        unit_price: Money,
    ) -> Self {
        use super::product_type::ProductTypeRequest;

        ProductEntryRequest {
            count,
            bundle_item_count,
            unit_price,
            product: ProductRequest {
                code: code.to_string(),
                name: name.to_string(),
                product_types: vec![ProductTypeRequest {
                    type_name: type_name.to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Upload request for an image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

// =============================================================================
// Cascade steps
// =============================================================================

async fn resolve_product(
    conn: &mut SqliteConnection,
    storage: &dyn FileStorage,
    request: &ProductEntryRequest,
    unit_measure_id: i64,
) -> ApiResult<Product> {
    let wanted = &request.product;

    if wanted.id > 0 {
        if let Some(found) = product::find_by_id(&mut *conn, wanted.id).await? {
            return Ok(found);
        }
    }
    if !is_blank(Some(wanted.code.as_str())) {
        if let Some(found) = product::find_by_code(&mut *conn, wanted.code.trim()).await? {
            return Ok(found);
        }
    }

    validate_product_code(&wanted.code)?;
    validate_name("name", &wanted.name)?;

    let image = settle_image(storage, wanted.image_path.as_deref()).await;
    let now = Utc::now();
    let mut created = Product {
        id: 0,
        code: wanted.code.trim().to_string(),
        name: wanted.name.trim().to_string(),
        normalized_name: normalize_name(&wanted.name),
        image_path: image,
        unit_measure_id,
        production_origin: request.production_origin,
        created_at: now,
        updated_at: now,
    };
    created.id = product::insert(&mut *conn, &created).await?;

    debug!(product_id = %created.id, code = %created.code, "Product created from entry");
    Ok(created)
}

/// Returns the type and whether it existed before this entry.
async fn resolve_type(
    conn: &mut SqliteConnection,
    request: &ProductEntryRequest,
    product_id: i64,
    currency_id: i64,
) -> ApiResult<(ProductType, bool)> {
    let wanted = request
        .product
        .product_types
        .first()
        .ok_or_else(|| CoreError::not_found("Product type", "request"))?;

    if wanted.id > 0 {
        if let Some(found) = product_type::find_by_id(&mut *conn, wanted.id).await? {
            if found.product_id == product_id {
                return Ok((found, true));
            }
        }
    }
    let type_name = wanted.type_name.trim();
    if !type_name.is_empty() {
        if let Some(found) = product_type::find_by_name(&mut *conn, product_id, type_name).await? {
            return Ok((found, true));
        }
    }

    validate_name("type", type_name)?;
    let mut created = ProductType {
        id: 0,
        product_id,
        type_name: type_name.to_string(),
        bundle_item_count: request.bundle_item_count,
        unit_price: request.unit_price,
        currency_id,
    };
    created.id = product_type::insert(&mut *conn, &created).await?;

    debug!(product_type_id = %created.id, type_name = %created.type_name, "Product type created from entry");
    Ok((created, false))
}

/// Cost of one item from the type's bill of materials.
pub(crate) async fn bill_of_materials_cost(
    conn: &mut SqliteConnection,
    product_type_id: i64,
) -> ApiResult<Money> {
    let mut components = Vec::new();
    for item in product_type::list_items(&mut *conn, product_type_id).await? {
        components.push(ComponentCost {
            quantity: item.quantity,
            latest_unit_cost: semi_product::latest_cost(&mut *conn, item.semi_product_id).await?,
        });
    }
    Ok(components_cost(&components)?)
}

/// Runs the whole create cascade on `conn`; returns the new entry id.
async fn record_entry(
    conn: &mut SqliteConnection,
    storage: &dyn FileStorage,
    request: &ProductEntryRequest,
) -> ApiResult<i64> {
    request.validate()?;
    let total_amount = line_total(request.unit_price, request.count)?;

    let currency = default_currency(&mut *conn).await?;
    let shop_id = match request.shop_id {
        Some(id) => shop::get(&mut *conn, id).await?.id,
        None => default_shop(&mut *conn).await?.id,
    };
    let unit = default_unit_measure(&mut *conn).await?;

    let found = resolve_product(&mut *conn, storage, request, unit.id).await?;
    let (mut pt, existed) = resolve_type(&mut *conn, request, found.id, currency.id).await?;

    pt.bundle_item_count = request.bundle_item_count;
    pt.unit_price = request.unit_price;
    product_type::update(&mut *conn, &pt).await?;
    product::set_production_origin(&mut *conn, found.id, request.production_origin).await?;

    if existed {
        if let Some(queue) = process::find_in_process(&mut *conn, pt.id).await? {
            if let Some(left) = take_from_process(queue.count, request.count) {
                process::set_in_process(&mut *conn, queue.id, left).await?;
                debug!(product_type_id = %pt.id, left, "Deducted from production queue");
            }
        }
    }

    let residue_id = match residue::find(&mut *conn, pt.id, shop_id).await? {
        Some(r) => {
            residue::add_count(&mut *conn, r.id, request.count).await?;
            r.id
        }
        None => residue::insert(&mut *conn, pt.id, shop_id, request.count).await?,
    };

    let cost_price = bill_of_materials_cost(&mut *conn, pt.id).await?;

    let now = Utc::now();
    let id = product_entry::insert(
        &mut *conn,
        &ProductEntry {
            id: 0,
            date: request.date.unwrap_or(now),
            count: request.count,
            bundle_item_count: request.bundle_item_count,
            cost_price,
            preparation_cost_per_unit: request.preparation_cost_per_unit,
            unit_price: request.unit_price,
            total_amount,
            production_origin: request.production_origin,
            product_type_id: pt.id,
            shop_id,
            product_residue_id: residue_id,
            currency_id: currency.id,
            created_at: now,
        },
    )
    .await?;

    Ok(id)
}

/// Removes an entry and takes its items back out of the residue.
async fn remove_entry(conn: &mut SqliteConnection, id: i64) -> ApiResult<ProductEntry> {
    let entry = product_entry::get(&mut *conn, id).await?;
    let current = residue::get(&mut *conn, entry.product_residue_id).await?;

    let left = current.count - entry.count;
    if left < 0 {
        return Err(CoreError::Forbidden(format!(
            "entry {} cannot be removed: {} of its items were already sold",
            entry.id, -left
        ))
        .into());
    }

    residue::set_count(&mut *conn, current.id, left).await?;
    product_entry::delete(&mut *conn, id).await?;
    Ok(entry)
}

// =============================================================================
// Operations
// =============================================================================

pub async fn create_product_entry(state: &AppState, request: ProductEntryRequest) -> ApiResult<i64> {
    debug!(
        product_id = %request.product.id,
        code = %request.product.code,
        count = request.count,
        "Creating product entry"
    );

    let mut tx = state.db.begin().await?;
    let id = record_entry(&mut tx, state.storage.as_ref(), &request).await?;
    commit(tx).await?;

    info!(entry_id = %id, count = request.count, "Product entry created");
    Ok(id)
}

/// Replaces an entry: the old one is reverted, the request recorded anew.
pub async fn update_product_entry(state: &AppState, request: ProductEntryRequest) -> ApiResult<i64> {
    debug!(entry_id = %request.id, "Updating product entry");
    validate_id("id", request.id)?;

    let mut tx = state.db.begin().await?;
    remove_entry(&mut tx, request.id).await?;
    let id = record_entry(&mut tx, state.storage.as_ref(), &request).await?;
    commit(tx).await?;

    info!(old_entry_id = %request.id, entry_id = %id, "Product entry replaced");
    Ok(id)
}

pub async fn delete_product_entry(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(entry_id = %id, "Deleting product entry");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let entry = remove_entry(&mut tx, id).await?;
    commit(tx).await?;

    info!(entry_id = %id, count = entry.count, "Product entry deleted");
    Ok(())
}

pub async fn list_product_entries(state: &AppState) -> ApiResult<Vec<ProductEntry>> {
    let mut conn = state.db.acquire().await?;
    Ok(product_entry::list(&mut conn).await?)
}

pub async fn filter_product_entries(
    state: &AppState,
    request: FilteringRequest,
) -> ApiResult<Vec<ProductEntry>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    Ok(product_entry::filter(&mut conn, &request).await?)
}

/// Presigned upload for a product image.
pub async fn image_upload_url(state: &AppState, request: UploadUrlRequest) -> ApiResult<UploadUrl> {
    super::files::upload_url(state, PRODUCT_IMAGE_FOLDER, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::product_type::ProductTypeRequest;
    use crate::services::test_support;
    use forex_core::{EntryToProcess, SemiProduct, SemiProductEntry};

    fn shim(count: i64) -> ProductEntryRequest {
        ProductEntryRequest::for_new_type("101", "Shim", "24-29", count, 12, Money::from_minor(500))
    }

    #[tokio::test]
    async fn test_first_entry_creates_everything() {
        let (state, _) = test_support::state().await;

        let id = create_product_entry(&state, shim(24)).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let entry = product_entry::get(&mut conn, id).await.unwrap();
        assert_eq!(entry.count, 24);
        assert_eq!(entry.total_amount, Money::from_minor(12_000));
        assert_eq!(entry.cost_price, Money::zero());

        let found = product::find_by_code(&mut conn, "101").await.unwrap().unwrap();
        let pt = product_type::find_by_name(&mut conn, found.id, "24-29")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pt.bundle_item_count, 12);

        let stock = residue::find(&mut conn, pt.id, entry.shop_id).await.unwrap().unwrap();
        assert_eq!(stock.count, 24);
        assert_eq!(stock.id, entry.product_residue_id);
    }

    #[tokio::test]
    async fn test_second_entry_reuses_product_and_type() {
        let (state, _) = test_support::state().await;

        create_product_entry(&state, shim(24)).await.unwrap();
        let mut second = shim(12);
        second.unit_price = Money::from_minor(550);
        let id = create_product_entry(&state, second).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        assert_eq!(product::list(&mut conn).await.unwrap().len(), 1);
        let entry = product_entry::get(&mut conn, id).await.unwrap();
        let pt = product_type::get(&mut conn, entry.product_type_id).await.unwrap();
        assert_eq!(pt.unit_price, Money::from_minor(550));

        let stock = residue::get(&mut conn, entry.product_residue_id).await.unwrap();
        assert_eq!(stock.count, 36);
    }

    #[tokio::test]
    async fn test_entry_without_type_is_not_found() {
        let (state, _) = test_support::state().await;
        let mut req = shim(10);
        req.product.product_types.clear();

        let err = create_product_entry(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        // Nothing was written
        let mut conn = state.db.acquire().await.unwrap();
        assert!(product::list(&mut conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_product_needs_code_and_name() {
        let (state, _) = test_support::state().await;
        let mut req = shim(10);
        req.product.name = String::new();

        let err = create_product_entry(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut req = shim(10);
        req.product.product_types = vec![ProductTypeRequest::default()];
        let err = create_product_entry(&state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_entry_deducts_production_queue_and_prices_materials() {
        let (state, _) = test_support::state().await;
        let first = create_product_entry(&state, shim(12)).await.unwrap();
        let defaults = test_support::defaults(&state).await;

        let mut conn = state.db.acquire().await.unwrap();
        let type_id = product_entry::get(&mut conn, first).await.unwrap().product_type_id;

        process::insert_entry(
            &mut conn,
            &EntryToProcess { id: 0, product_type_id: type_id, count: 30, date: Utc::now() },
        )
        .await
        .unwrap();
        process::add_in_process(&mut conn, type_id, 30).await.unwrap();

        let cloth = semi_product::insert(
            &mut conn,
            &SemiProduct {
                id: 0,
                name: "Mato".to_string(),
                normalized_name: "MATO".to_string(),
                unit_measure_id: defaults.unit_measure_id,
                image_path: None,
            },
        )
        .await
        .unwrap();
        semi_product::insert_entry(
            &mut conn,
            &SemiProductEntry {
                id: 0,
                semi_product_id: cloth,
                quantity: 100,
                cost_price: Money::from_minor(40),
                date: Utc::now(),
            },
        )
        .await
        .unwrap();
        product_type::replace_items(&mut conn, type_id, &[(cloth, 3)])
            .await
            .unwrap();
        drop(conn);

        let id = create_product_entry(&state, shim(24)).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let queue = process::find_in_process(&mut conn, type_id).await.unwrap().unwrap();
        assert_eq!(queue.count, 6);

        let entry = product_entry::get(&mut conn, id).await.unwrap();
        assert_eq!(entry.cost_price, Money::from_minor(120));
    }

    #[tokio::test]
    async fn test_short_queue_is_left_alone() {
        let (state, _) = test_support::state().await;
        let first = create_product_entry(&state, shim(12)).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let type_id = product_entry::get(&mut conn, first).await.unwrap().product_type_id;
        process::add_in_process(&mut conn, type_id, 5).await.unwrap();
        drop(conn);

        create_product_entry(&state, shim(24)).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let queue = process::find_in_process(&mut conn, type_id).await.unwrap().unwrap();
        assert_eq!(queue.count, 5);
    }

    #[tokio::test]
    async fn test_delete_entry_reverses_residue() {
        let (state, _) = test_support::state().await;
        let keep = create_product_entry(&state, shim(24)).await.unwrap();
        let id = create_product_entry(&state, shim(12)).await.unwrap();

        delete_product_entry(&state, id).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let entry = product_entry::get(&mut conn, keep).await.unwrap();
        let stock = residue::get(&mut conn, entry.product_residue_id).await.unwrap();
        assert_eq!(stock.count, 24);
        assert!(product_entry::find_by_id(&mut conn, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_entry_with_sold_stock_is_forbidden() {
        let (state, _) = test_support::state().await;
        let id = create_product_entry(&state, shim(24)).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let entry = product_entry::get(&mut conn, id).await.unwrap();
        residue::set_count(&mut conn, entry.product_residue_id, 10)
            .await
            .unwrap();
        drop(conn);

        let err = delete_product_entry(&state, id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_update_entry_replaces_it() {
        let (state, _) = test_support::state().await;
        let id = create_product_entry(&state, shim(24)).await.unwrap();

        let mut req = shim(36);
        req.id = id;
        let new_id = update_product_entry(&state, req).await.unwrap();
        assert_ne!(new_id, id);

        let mut conn = state.db.acquire().await.unwrap();
        assert!(product_entry::find_by_id(&mut conn, id).await.unwrap().is_none());
        let entry = product_entry::get(&mut conn, new_id).await.unwrap();
        let stock = residue::get(&mut conn, entry.product_residue_id).await.unwrap();
        assert_eq!(stock.count, 36);
    }

    #[tokio::test]
    async fn test_image_upload_url_is_under_temp_products() {
        let (state, _) = test_support::state().await;

        let upload = image_upload_url(
            &state,
            UploadUrlRequest { file_name: "photo.PNG".to_string(), file_size: Some(1024) },
        )
        .await
        .unwrap();
        assert!(upload.key.starts_with("uploads/temp/products/"));
        assert!(upload.key.ends_with(".png"));

        let err = image_upload_url(
            &state,
            UploadUrlRequest { file_name: "notes.txt".to_string(), file_size: None },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
