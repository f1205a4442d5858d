//! Shops, currencies, units of measure and generic uploads.

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;

use forex_core::{Currency, UnitMeasure};

use super::Reply;
use crate::extract::{ApiJson, IdPath};
use crate::response::ApiResponse;
use crate::services::currency::{self, CurrencyRequest};
use crate::services::files::{self, FolderUploadRequest};
use crate::services::shop::{self, ShopDto, ShopRequest};
use crate::services::unit_measure::{self, UnitMeasureRequest};
use crate::storage::UploadUrl;
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/shops", get(list_shops).post(create_shop))
        .route("/api/shops/{id}", delete(delete_shop))
        .route(
            "/api/currencies",
            get(list_currencies)
                .post(create_currency)
                .put(update_currency),
        )
        .route("/api/currencies/{id}", delete(delete_currency))
        .route(
            "/api/unit-measures",
            get(list_unit_measures)
                .post(create_unit_measure)
                .put(update_unit_measure),
        )
        .route("/api/unit-measures/{id}", delete(delete_unit_measure))
        .route("/api/files/upload-url", post(upload_url))
}

async fn list_shops(State(state): State<AppState>) -> Reply<Vec<ShopDto>> {
    Ok(ApiResponse::ok(shop::list_shops(&state).await?))
}

async fn create_shop(State(state): State<AppState>, ApiJson(request): ApiJson<ShopRequest>) -> Reply<i64> {
    Ok(ApiResponse::ok(shop::create_shop(&state, request).await?))
}

async fn delete_shop(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    shop::delete_shop(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn list_currencies(State(state): State<AppState>) -> Reply<Vec<Currency>> {
    Ok(ApiResponse::ok(currency::list_currencies(&state).await?))
}

async fn create_currency(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CurrencyRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(currency::create_currency(&state, request).await?))
}

async fn update_currency(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CurrencyRequest>,
) -> Reply<bool> {
    currency::update_currency(&state, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_currency(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    currency::delete_currency(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn list_unit_measures(State(state): State<AppState>) -> Reply<Vec<UnitMeasure>> {
    Ok(ApiResponse::ok(unit_measure::list_unit_measures(&state).await?))
}

async fn create_unit_measure(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UnitMeasureRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        unit_measure::create_unit_measure(&state, request).await?,
    ))
}

async fn update_unit_measure(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UnitMeasureRequest>,
) -> Reply<bool> {
    unit_measure::update_unit_measure(&state, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_unit_measure(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    unit_measure::delete_unit_measure(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn upload_url(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FolderUploadRequest>,
) -> Reply<UploadUrl> {
    Ok(ApiResponse::ok(files::folder_upload_url(&state, request).await?))
}
