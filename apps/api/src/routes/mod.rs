//! # HTTP Routes
//!
//! Handlers extract the request, call one service function and wrap the
//! result in [`ApiResponse`]. Creates answer with the new id, updates and
//! deletes with `true`.
//!
//! ```text
//! /health                      public
//! /api/auth/login              public
//! /api/**                      bearer token (auth_middleware)
//! ```

mod catalog;
mod lookups;
mod people;
mod sales;
mod stock;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use forex_db::migrations::migration_status;

use crate::auth::auth_middleware;
use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::AppState;

/// Handler result: envelope on success, [`crate::ApiError`] otherwise.
pub(crate) type Reply<T> = ApiResult<ApiResponse<T>>;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    database: bool,
    migrations: Option<Migrations>,
}

#[derive(Debug, Serialize)]
struct Migrations {
    embedded: usize,
    applied: usize,
}

/// Liveness plus schema state. Degraded when the database is unreachable
/// or lags behind the embedded migrations.
async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = state.db.health_check().await;
    let migrations = match migration_status(state.db.pool()).await {
        Ok((embedded, applied)) => Some(Migrations { embedded, applied }),
        Err(e) => {
            warn!(error = %e, "Migration status unavailable");
            None
        }
    };
    let current = migrations
        .as_ref()
        .is_some_and(|m| m.applied >= m.embedded);

    Json(Health {
        status: if database && current { "ok" } else { "degraded" },
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database,
        migrations,
    })
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(catalog::routes())
        .merge(stock::routes())
        .merge(sales::routes())
        .merge(people::routes())
        .merge(lookups::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(people::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_client {
    //! Drives the router with `oneshot` requests.

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use forex_core::UserRole;

    use crate::AppState;

    pub fn token(state: &AppState, user_id: i64, role: UserRole) -> String {
        state
            .jwt
            .generate_access_token(user_id, "tester", role)
            .unwrap()
    }

    /// Sends one request and returns the status with the parsed envelope.
    pub async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = super::router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
