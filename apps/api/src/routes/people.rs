//! Users and login.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Router};

use forex_db::FilteringRequest;

use super::Reply;
use crate::auth::CurrentUser;
use crate::extract::{ApiJson, IdPath};
use crate::response::ApiResponse;
use crate::services::auth::{self, LoginRequest, LoginResponse};
use crate::services::user::{self, UserDto, UserRequest};
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user).put(update_user))
        .route("/api/users/{id}", get(get_user).delete(delete_user))
        .route("/api/users/filter", post(filter_users))
}

/// Public; mounted outside the auth layer.
pub(super) async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Reply<LoginResponse> {
    Ok(ApiResponse::ok(auth::login(&state, request).await?))
}

async fn list_users(State(state): State<AppState>) -> Reply<Vec<UserDto>> {
    Ok(ApiResponse::ok(user::list_users(&state).await?))
}

async fn get_user(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<UserDto> {
    Ok(ApiResponse::ok(user::get_user(&state, id).await?))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<UserRequest>,
) -> Reply<i64> {
    Ok(ApiResponse::ok(user::create_user(&state, &current, request).await?))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<UserRequest>,
) -> Reply<bool> {
    user::update_user(&state, &current, request).await?;
    Ok(ApiResponse::ok(true))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    IdPath(id): IdPath,
) -> Reply<bool> {
    user::delete_user(&state, &current, id).await?;
    Ok(ApiResponse::ok(true))
}

async fn filter_users(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FilteringRequest>,
) -> Reply<Vec<UserDto>> {
    Ok(ApiResponse::ok(user::filter_users(&state, request).await?))
}
