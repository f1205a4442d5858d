//! Users: staff, customers and suppliers, with their currency accounts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use forex_core::validation::{is_temp_key, normalize_name, validate_id, validate_name};
use forex_core::{CoreError, Money, User, UserAccount, UserRole};
use forex_db::repository::{currency, user};
use forex_db::FilteringRequest;

use super::{check_filter, commit, discard_image, image_url, settle_image};
use crate::auth::{hash_password, CurrentUser};
use crate::error::ApiResult;
use crate::storage::FileStorage;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRequest {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    /// Plain password; hashed before it is stored.
    pub password: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: UserRole,
    pub address: Option<String>,
    pub description: Option<String>,
    pub profile_image: Option<String>,
    pub accounts: Vec<AccountRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountRequest {
    pub currency_id: i64,
    pub opening_balance: Money,
    pub discount: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[serde(flatten)]
    pub user: User,
    pub image_url: Option<String>,
    pub accounts: Vec<UserAccount>,
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn ensure_name_free(
    conn: &mut SqliteConnection,
    normalized: &str,
    name: &str,
    own_id: i64,
) -> ApiResult<()> {
    if let Some(other) = user::find_by_normalized_name(&mut *conn, normalized).await? {
        if other.id != own_id {
            return Err(CoreError::already_exists("User", "name", name).into());
        }
    }
    Ok(())
}

async fn ensure_username_free(
    conn: &mut SqliteConnection,
    username: Option<&str>,
    own_id: i64,
) -> ApiResult<()> {
    let Some(username) = username else {
        return Ok(());
    };
    if let Some(other) = user::find_by_username(&mut *conn, username).await? {
        if other.id != own_id {
            return Err(CoreError::already_exists("User", "username", username).into());
        }
    }
    Ok(())
}

async fn save_accounts(
    conn: &mut SqliteConnection,
    user_id: i64,
    accounts: &[AccountRequest],
) -> ApiResult<()> {
    for account in accounts {
        validate_id("currency_id", account.currency_id)?;
        currency::get(&mut *conn, account.currency_id).await?;
        user::upsert_account(
            &mut *conn,
            user_id,
            account.currency_id,
            account.opening_balance,
            account.discount,
        )
        .await?;
    }
    Ok(())
}

pub(crate) async fn to_dto(
    conn: &mut SqliteConnection,
    storage: &dyn FileStorage,
    found: User,
) -> ApiResult<UserDto> {
    let accounts = user::list_accounts(&mut *conn, found.id).await?;
    Ok(UserDto {
        image_url: image_url(storage, found.profile_image.as_deref()),
        accounts,
        user: found,
    })
}

// =============================================================================
// Operations
// =============================================================================

/// Creates a user. Login names and staff roles are handed out by admins only.
pub async fn create_user(
    state: &AppState,
    current: &CurrentUser,
    request: UserRequest,
) -> ApiResult<i64> {
    debug!(name = %request.name, role = ?request.role, "Creating user");
    validate_name("name", &request.name)?;

    let username = optional(&request.username);
    if username.is_some() || matches!(request.role, UserRole::Admin | UserRole::Employee) {
        current.require_admin()?;
    }
    let password_hash = match optional(&request.password) {
        Some(password) => Some(hash_password(&password)?),
        None => None,
    };

    let normalized = normalize_name(&request.name);
    let mut tx = state.db.begin().await?;

    ensure_name_free(&mut tx, &normalized, &request.name, 0).await?;
    ensure_username_free(&mut tx, username.as_deref(), 0).await?;

    let image = settle_image(state.storage.as_ref(), request.profile_image.as_deref()).await;
    let now = Utc::now();
    let id = user::insert(
        &mut tx,
        &User {
            id: 0,
            name: request.name.trim().to_string(),
            normalized_name: normalized,
            username,
            phone: optional(&request.phone),
            email: optional(&request.email),
            role: request.role,
            address: optional(&request.address),
            description: optional(&request.description),
            password_hash,
            profile_image: image,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;
    save_accounts(&mut tx, id, &request.accounts).await?;

    commit(tx).await?;
    info!(user_id = %id, role = ?request.role, "User created");
    Ok(id)
}

pub async fn update_user(
    state: &AppState,
    current: &CurrentUser,
    request: UserRequest,
) -> ApiResult<()> {
    debug!(user_id = %request.id, "Updating user");
    validate_id("id", request.id)?;
    validate_name("name", &request.name)?;

    let mut tx = state.db.begin().await?;
    let existing = user::get(&mut tx, request.id).await?;

    let username = optional(&request.username);
    if username != existing.username || request.role != existing.role {
        current.require_admin()?;
    }
    // Someone else's password or an admin account is admin territory
    let own = current.id == existing.id;
    if !own && (optional(&request.password).is_some() || existing.role == UserRole::Admin) {
        current.require_admin()?;
    }

    let normalized = normalize_name(&request.name);
    ensure_name_free(&mut tx, &normalized, &request.name, existing.id).await?;
    ensure_username_free(&mut tx, username.as_deref(), existing.id).await?;

    let password_hash = match optional(&request.password) {
        Some(password) => Some(hash_password(&password)?),
        None => existing.password_hash.clone(),
    };

    let mut stale_image = None;
    let image = match request.profile_image.as_deref().map(str::trim) {
        None | Some("") => {
            stale_image = existing.profile_image.clone();
            None
        }
        Some(key) if is_temp_key(key) => {
            stale_image = existing.profile_image.clone();
            settle_image(state.storage.as_ref(), Some(key)).await
        }
        Some(key) => Some(key.to_string()),
    };

    user::update(
        &mut tx,
        &User {
            name: request.name.trim().to_string(),
            normalized_name: normalized,
            username,
            phone: optional(&request.phone),
            email: optional(&request.email),
            role: request.role,
            address: optional(&request.address),
            description: optional(&request.description),
            password_hash,
            profile_image: image,
            updated_at: Utc::now(),
            ..existing.clone()
        },
    )
    .await?;
    save_accounts(&mut tx, existing.id, &request.accounts).await?;

    commit(tx).await?;
    info!(user_id = %existing.id, "User updated");

    discard_image(state.storage.as_ref(), stale_image.as_deref()).await;
    Ok(())
}

/// Deletes a user without history. Sales or cash movements make it Forbidden.
pub async fn delete_user(state: &AppState, current: &CurrentUser, id: i64) -> ApiResult<()> {
    debug!(user_id = %id, "Deleting user");
    validate_id("id", id)?;
    if current.id == id {
        return Err(CoreError::Forbidden("you cannot delete yourself".to_string()).into());
    }

    let mut tx = state.db.begin().await?;
    let existing = user::get(&mut tx, id).await?;
    if existing.role == UserRole::Admin {
        current.require_admin()?;
    }
    if user::has_history(&mut tx, id).await? {
        return Err(CoreError::Forbidden(format!(
            "user {} has sales or transactions and cannot be deleted",
            existing.name
        ))
        .into());
    }
    user::delete(&mut tx, id).await?;
    commit(tx).await?;

    info!(user_id = %id, "User deleted");
    discard_image(state.storage.as_ref(), existing.profile_image.as_deref()).await;
    Ok(())
}

pub async fn get_user(state: &AppState, id: i64) -> ApiResult<UserDto> {
    validate_id("id", id)?;
    let mut conn = state.db.acquire().await?;
    let found = user::get(&mut conn, id).await?;
    to_dto(&mut conn, state.storage.as_ref(), found).await
}

pub async fn list_users(state: &AppState) -> ApiResult<Vec<UserDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for u in user::list(&mut conn).await? {
        out.push(to_dto(&mut conn, state.storage.as_ref(), u).await?);
    }
    Ok(out)
}

pub async fn filter_users(state: &AppState, request: FilteringRequest) -> ApiResult<Vec<UserDto>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for u in user::filter(&mut conn, &request).await? {
        out.push(to_dto(&mut conn, state.storage.as_ref(), u).await?);
    }
    Ok(out)
}
