//! # forex-api: HTTP API for Forex
//!
//! The desktop client talks to this crate over JSON. Handlers are thin:
//! they extract the request, call one service function and wrap the
//! result in the response envelope.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Forex API                                      │
//! │                                                                         │
//! │  Desktop ──► axum Router ──► auth_middleware ──► routes::*              │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                        services::* (transaction scripts)│
//! │                                           │                  │          │
//! │                                           ▼                  ▼          │
//! │                                    forex-core rules   forex-db repos    │
//! │                                                              │          │
//! │                                       FileStorage (S3) ◄─────┘          │
//! │                                                                         │
//! │  TempCleanup (background) ──► FileStorage::cleanup_expired              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Environment configuration
//! - [`error`] - `ApiError` and status mapping
//! - [`extract`] - JSON body and path extractors rejecting with `ApiError`
//! - [`response`] - Response envelope
//! - [`auth`] - JWT, password hashing, auth middleware
//! - [`storage`] - Object storage trait and S3 implementation
//! - [`cleanup`] - Temp upload sweep
//! - [`services`] - Transaction scripts, one module per aggregate
//! - [`routes`] - HTTP handlers and the router

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod extract;
pub mod response;
pub mod routes;
pub mod services;
pub mod storage;

use std::sync::Arc;

use forex_db::Database;

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::storage::FileStorage;

pub use crate::error::{ApiError, ApiResult, ErrorCode};
pub use crate::routes::router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub storage: Arc<dyn FileStorage>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig, storage: Arc<dyn FileStorage>) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_access_ttl_secs);
        AppState {
            db,
            config: Arc::new(config),
            storage,
            jwt: Arc::new(jwt),
        }
    }
}
