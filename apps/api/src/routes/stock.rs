//! Stock entries, semi-products and the production queue.

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;

use forex_core::{EntryToProcess, ProductEntry};
use forex_db::FilteringRequest;

use super::Reply;
use crate::extract::{ApiJson, IdPath};
use crate::response::ApiResponse;
use crate::services::process::{self, InProcessDto, ProcessRequest};
use crate::services::product_entry::{self, ProductEntryRequest, UploadUrlRequest};
use crate::services::semi_product::{self, SemiProductDto, SemiProductEntryRequest, SemiProductRequest};
use crate::storage::UploadUrl;
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/product-entries",
            get(list_entries).post(create_entry).put(update_entry),
        )
        .route("/api/product-entries/{id}", delete(delete_entry))
        .route("/api/product-entries/filter", post(filter_entries))
        .route("/api/product-entries/image/upload-url", post(entry_image_upload_url))
        .route(
            "/api/semi-products",
            get(list_semi_products).post(create_semi_product),
        )
        .route("/api/semi-products/entries", post(create_semi_product_entry))
        .route("/api/processes", get(list_in_process).post(send_to_process))
        .route("/api/processes/entries", get(list_process_entries))
}

// =============================================================================
// Product Entries
// =============================================================================

async fn list_entries(State(state): State<AppState>) -> Reply<Vec<ProductEntry>> {
    Ok(ApiResponse::ok(product_entry::list_product_entries(&state).await?))
}

async fn create_entry(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProductEntryRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        product_entry::create_product_entry(&state, request).await?,
    ))
}

/// Replaces an entry; the answer is the id of the entry that replaced it.
async fn update_entry(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProductEntryRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        product_entry::update_product_entry(&state, request).await?,
    ))
}

async fn delete_entry(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<bool> {
    product_entry::delete_product_entry(&state, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn filter_entries(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<ProductEntry>> {
    Ok(ApiResponse::ok(
        product_entry::filter_product_entries(&state, request).await?,
    ))
}

async fn entry_image_upload_url(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UploadUrlRequest>,
) -> Reply<UploadUrl> {
    Ok(ApiResponse::ok(
        product_entry::image_upload_url(&state, request).await?,
    ))
}

// =============================================================================
// Semi-Products
// =============================================================================

async fn list_semi_products(State(state): State<AppState>) -> Reply<Vec<SemiProductDto>> {
    Ok(ApiResponse::ok(semi_product::list_semi_products(&state).await?))
}

async fn create_semi_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SemiProductRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        semi_product::create_semi_product(&state, request).await?,
    ))
}

async fn create_semi_product_entry(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SemiProductEntryRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(
        semi_product::create_semi_product_entry(&state, request).await?,
    ))
}

// =============================================================================
// Production
// =============================================================================

async fn list_in_process(State(state): State<AppState>) -> Reply<Vec<InProcessDto>> {
    Ok(ApiResponse::ok(process::list_in_process(&state).await?))
}

async fn send_to_process(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProcessRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(process::send_to_process(&state, request).await?))
}

async fn list_process_entries(State(state): State<AppState>) -> Reply<Vec<EntryToProcess>> {
    Ok(ApiResponse::ok(process::list_process_entries(&state).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_client::{send, token};
    use crate::services::test_support;
    use forex_core::UserRole;

    fn entry(count: i64) -> serde_json::Value {
        json!({
            "count": count,
            "bundleItemCount": 12,
            "unitPrice": 2000,
            "preparationCostPerUnit": 50,
            "product": {
                "code": "201",
                "name": "Shippak",
                "productTypes": [{ "type": "38" }]
            }
        })
    }

    #[tokio::test]
    async fn test_entry_then_residue_over_http() {
        let (state, _) = test_support::state().await;
        let auth = token(&state, 1, UserRole::Employee);

        let (status, body) =
            send(&state, Method::POST, "/api/product-entries", Some(&auth), Some(entry(24))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["data"].as_i64().unwrap();

        let (_, body) = send(&state, Method::GET, "/api/product-residues", Some(&auth), None).await;
        assert_eq!(body["data"][0]["count"], 24);

        let (status, _) = send(
            &state,
            Method::DELETE,
            &format!("/api/product-entries/{id}"),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&state, Method::GET, "/api/product-residues", Some(&auth), None).await;
        assert_eq!(body["data"][0]["count"], 0);
    }

    #[tokio::test]
    async fn test_image_upload_url_validates_extension() {
        let (state, _) = test_support::state().await;
        let auth = token(&state, 1, UserRole::Employee);

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/product-entries/image/upload-url",
            Some(&auth),
            Some(json!({ "fileName": "shoe.png", "fileSize": 1024 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["key"]
            .as_str()
            .unwrap()
            .starts_with("uploads/temp/products/"));

        let (status, _) = send(
            &state,
            Method::POST,
            "/api/product-entries/image/upload-url",
            Some(&auth),
            Some(json!({ "fileName": "script.exe" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_semi_products_and_queue() {
        let (state, _) = test_support::state().await;
        let auth = token(&state, 1, UserRole::Employee);

        let (_, body) = send(
            &state,
            Method::POST,
            "/api/semi-products",
            Some(&auth),
            Some(json!({ "name": "Taglik" })),
        )
        .await;
        let semi = body["data"].as_i64().unwrap();
        let (status, _) = send(
            &state,
            Method::POST,
            "/api/semi-products/entries",
            Some(&auth),
            Some(json!({ "semiProductId": semi, "quantity": 100, "costPrice": 40 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&state, Method::GET, "/api/semi-products", Some(&auth), None).await;
        assert_eq!(body["data"][0]["latestCost"], 40);

        send(&state, Method::POST, "/api/product-entries", Some(&auth), Some(entry(12))).await;
        let (_, types) = send(&state, Method::GET, "/api/product-types", Some(&auth), None).await;
        let type_id = types["data"][0]["id"].as_i64().unwrap();

        let (status, _) = send(
            &state,
            Method::POST,
            "/api/processes",
            Some(&auth),
            Some(json!({ "productTypeId": type_id, "count": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&state, Method::GET, "/api/processes", Some(&auth), None).await;
        assert_eq!(body["data"][0]["count"], 10);
        assert_eq!(body["data"][0]["type"], "38");
    }
}
