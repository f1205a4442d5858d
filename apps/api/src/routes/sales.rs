//! Sales and cash transactions.

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;

use forex_db::FilteringRequest;

use super::Reply;
use crate::extract::{ApiJson, IdPath};
use crate::response::ApiResponse;
use crate::services::sale::{self, SaleDto, SaleRequest};
use crate::services::transaction::{self, TransactionDto, TransactionRequest};
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(list_sales).post(create_sale).put(update_sale))
        .route("/api/sales/{id}", get(get_sale).delete(delete_sale))
        .route("/api/sales/filter", post(filter_sales))
        .route(
            "/api/transactions",
            get(list_transactions)
                .post(create_transaction)
                .put(update_transaction),
        )
        .route("/api/transactions/{id}", delete(delete_transaction))
        .route("/api/transactions/filter", post(filter_transactions))
}

async fn list_sales(State(state): State<AppState>) -> Reply<Vec<SaleDto>> {
    Ok(ApiResponse::ok(sale::list_sales(&state).await?))
}

async fn get_sale(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<SaleDto> {
    Ok(ApiResponse::ok(sale::get_sale(&state, id).await?))
}

async fn create_sale(State(state): State<AppState>, ApiJson(request): ApiJson<SaleRequest>) -> Reply<i64> {
    Ok(ApiResponse::ok(sale::create_sale(&state, request).await?))
}

async fn update_sale(State(state): State<AppState>, ApiJson(request): ApiJson<SaleRequest>) -> Reply<bool> {
    sale::update_sale(&state, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_sale(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    sale::delete_sale(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn filter_sales(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<SaleDto>> {
    Ok(ApiResponse::ok(sale::filter_sales(&state, request).await?))
}

async fn list_transactions(State(state): State<AppState>) -> Reply<Vec<TransactionDto>> {
    Ok(ApiResponse::ok(transaction::list_transactions(&state).await?))
}

async fn create_transaction(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        transaction::create_transaction(&state, request).await?,
    ))
}

async fn update_transaction(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> Reply<bool> {
    transaction::update_transaction(&state, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_transaction(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    transaction::delete_transaction(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn filter_transactions(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<TransactionDto>> {
    Ok(ApiResponse::ok(
        transaction::filter_transactions(&state, request).await?,
    ))
}
