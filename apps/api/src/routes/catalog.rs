//! Products, product types and residues.

use axum::extract::State;
use axum::routing::{delete, get, post, put};
use axum::Router;

use forex_core::{ProductResidue, ProductTypeItem};
use forex_db::FilteringRequest;

use super::Reply;
use crate::extract::{ApiJson, IdPath};
use crate::response::ApiResponse;
use crate::services::product::{self, ProductDto, ProductRequest};
use crate::services::product_type::{self, ProductTypeDto, ProductTypeRequest, TypeItemRequest};
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products",
            get(list_products).post(create_product).put(update_product),
        )
        .route("/api/products/{id}", get(get_product).delete(delete_product))
        .route("/api/products/filter", post(filter_products))
        .route(
            "/api/product-types",
            get(list_product_types)
                .post(create_product_type)
                .put(update_product_type),
        )
        .route("/api/product-types/{id}", delete(delete_product_type))
        .route("/api/product-types/filter", post(filter_product_types))
        .route("/api/product-types/{id}/items", put(set_type_items))
        .route("/api/product-residues", get(list_residues))
        .route("/api/product-residues/filter", post(filter_residues))
}

// =============================================================================
// Products
// =============================================================================

async fn list_products(State(state): State<AppState>) -> Reply<Vec<ProductDto>> {
    Ok(ApiResponse::ok(product::list_products(&state).await?))
}

async fn get_product(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<ProductDto> {
    Ok(ApiResponse::ok(product::get_product(&state, id).await?))
}

async fn create_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProductRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(product::create_product(&state, request).await?))
}

async fn update_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProductRequest>,
) -> Reply<bool> {
    product::update_product(&state, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_product(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    product::delete_product(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn filter_products(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<ProductDto>> {
    Ok(ApiResponse::ok(product::filter_products(&state, request).await?))
}

// =============================================================================
// Product Types
// =============================================================================

async fn list_product_types(State(state): State<AppState>) -> Reply<Vec<ProductTypeDto>> {
    Ok(ApiResponse::ok(product_type::list_product_types(&state).await?))
}

async fn create_product_type(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProductTypeRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        product_type::create_product_type(&state, request).await?,
    ))
}

async fn update_product_type(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProductTypeRequest>,
) -> Reply<bool> {
    product_type::update_product_type(&state, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_product_type(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    product_type::delete_product_type(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn filter_product_types(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<ProductTypeDto>> {
    Ok(ApiResponse::ok(
        product_type::filter_product_types(&state, request).await?,
    ))
}

async fn set_type_items(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ApiJson(items): ApiJson<Vec<TypeItemRequest>>,
) -> Reply<Vec<ProductTypeItem>> {
    Ok(ApiResponse::ok(
        product_type::set_type_items(&state, id, items).await?,
    ))
}

// =============================================================================
// Residues
// =============================================================================

async fn list_residues(State(state): State<AppState>) -> Reply<Vec<ProductResidue>> {
    Ok(ApiResponse::ok(product_type::list_residues(&state).await?))
}

async fn filter_residues(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<ProductResidue>> {
    Ok(ApiResponse::ok(product_type::filter_residues(&state, request).await?))
}
