//! Login and the first-start admin account.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use forex_core::validation::{normalize_name, validate_required};
use forex_core::{User, UserRole};
use forex_db::repository::user;
use forex_db::Database;

use super::commit;
use super::user::{to_dto, UserDto};
use crate::auth::{hash_password, verify_password, AuthError};
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserDto,
}

/// Checks the credentials and issues an access token.
///
/// Unknown users, users without a password and wrong passwords all fail
/// with the same error.
pub async fn login(state: &AppState, request: LoginRequest) -> ApiResult<LoginResponse> {
    let username = request.username.trim();
    debug!(username = %username, "Login attempt");
    validate_required("username", username)?;
    validate_required("password", &request.password)?;

    let mut conn = state.db.acquire().await?;
    let Some(found) = user::find_by_username(&mut conn, username).await? else {
        warn!(username = %username, "Login for unknown user");
        return Err(AuthError::InvalidCredentials.into());
    };
    let verified = found
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&request.password, hash));
    if !verified {
        warn!(user_id = %found.id, "Login with wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let access_token = state
        .jwt
        .generate_access_token(found.id, username, found.role)?;
    info!(user_id = %found.id, role = ?found.role, "User logged in");

    Ok(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_lifetime_secs(),
        user: to_dto(&mut conn, state.storage.as_ref(), found).await?,
    })
}

/// Creates the configured admin when the database has none.
///
/// An existing user with the configured username is promoted instead.
/// Returns the admin id when something was written.
pub async fn bootstrap_admin(db: &Database, config: &ApiConfig) -> ApiResult<Option<i64>> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(None);
    };

    let mut tx = db.begin().await?;
    if user::count_admins(&mut tx).await? > 0 {
        return Ok(None);
    }

    let password_hash = Some(hash_password(password)?);
    let now = Utc::now();
    let id = match user::find_by_username(&mut tx, username).await? {
        Some(existing) => {
            let id = existing.id;
            user::update(
                &mut tx,
                &User {
                    role: UserRole::Admin,
                    password_hash,
                    updated_at: now,
                    ..existing
                },
            )
            .await?;
            id
        }
        None => {
            user::insert(
                &mut tx,
                &User {
                    id: 0,
                    name: username.clone(),
                    normalized_name: normalize_name(username),
                    username: Some(username.clone()),
                    phone: None,
                    email: None,
                    role: UserRole::Admin,
                    address: None,
                    description: Some("Created at first start".to_string()),
                    password_hash,
                    profile_image: None,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?
        }
    };
    commit(tx).await?;

    info!(user_id = %id, username = %username, "Admin account bootstrapped");
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support;

    fn configured(username: &str, password: &str) -> ApiConfig {
        ApiConfig {
            admin_username: Some(username.to_string()),
            admin_password: Some(password.to_string()),
            ..ApiConfig::for_tests()
        }
    }

    fn credentials(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_then_login() {
        let (state, _) = test_support::state().await;
        let config = configured("admin", "admin123");

        let id = bootstrap_admin(&state.db, &config).await.unwrap().unwrap();
        // Second start leaves the admin alone.
        assert_eq!(bootstrap_admin(&state.db, &config).await.unwrap(), None);

        let response = login(&state, credentials("admin", "admin123")).await.unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.user.user.id, id);
        assert!(response.user.user.password_hash.is_some());

        let current = state.jwt.validate_access_token(&response.access_token).unwrap();
        assert_eq!(current.id, id);
        assert!(current.is_admin());
    }

    #[tokio::test]
    async fn test_bootstrap_without_credentials_does_nothing() {
        let (state, _) = test_support::state().await;
        assert_eq!(bootstrap_admin(&state.db, &ApiConfig::for_tests()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bootstrap_promotes_existing_username() {
        let (state, _) = test_support::state().await;
        let id = test_support::person(&state, "Boss", UserRole::Employee).await;
        let mut conn = state.db.acquire().await.unwrap();
        let mut boss = user::get(&mut conn, id).await.unwrap();
        boss.username = Some("boss".to_string());
        user::update(&mut conn, &boss).await.unwrap();
        drop(conn);

        let promoted = bootstrap_admin(&state.db, &configured("boss", "pw"))
            .await
            .unwrap();
        assert_eq!(promoted, Some(id));

        let response = login(&state, credentials("boss", "pw")).await.unwrap();
        assert_eq!(response.user.user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let (state, _) = test_support::state().await;
        bootstrap_admin(&state.db, &configured("admin", "admin123"))
            .await
            .unwrap();

        let wrong = login(&state, credentials("admin", "nope")).await.unwrap_err();
        let unknown = login(&state, credentials("ghost", "admin123")).await.unwrap_err();
        assert_eq!(wrong.code, ErrorCode::Unauthorized);
        assert_eq!(wrong.code, unknown.code);
        assert_eq!(wrong.message, unknown.message);

        let blank = login(&state, credentials(" ", "x")).await.unwrap_err();
        assert_eq!(blank.code, ErrorCode::ValidationError);
    }
}
