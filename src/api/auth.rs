use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate_password_len;
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, PasswordChange, TokenResponse};
use crate::schemas::user::UserResponse;
use crate::services::views;

const INVALID_CREDENTIALS: &str = "Incorrect name or password";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", post(change_password))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let name = payload.name.trim();

    let security_settings = state.settings().security();
    let rate_key = format!("rl:login:{name}");
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            security_settings.login_rate_limit,
            security_settings.login_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user = repositories::users::find(state.store(), state.paths(), name)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;

    if !check_password(&payload.password, &user.password_hash)? {
        metrics::counter!("auth_logins_total", "outcome" => "rejected").increment(1);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    if security::needs_rehash(&user.password_hash) {
        upgrade_legacy_hash(&state, &user, &payload.password).await;
    }

    let token = security::create_access_token(&user.name, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;
    metrics::counter!("auth_logins_total", "outcome" => "accepted").increment(1);
    tracing::info!(user = %user.name, "User logged in");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    }))
}

/// Revokes the presented token until it would have expired anyway.
async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    let remaining = current.claims.exp - OffsetDateTime::now_utc().unix_timestamp();
    if remaining > 0 {
        state
            .redis()
            .set_string(&security::revoked_token_key(&current.claims.jti), "1", remaining as u64)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to revoke token"))?;
    }
    tracing::info!(user = %current.name(), "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(current.user))
}

async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !check_password(&payload.current_password, &current.user.password_hash)? {
        return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
    }
    validate_password_len(&payload.new_password)?;

    let hash = security::hash_password(&payload.new_password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    repositories::users::update_password(state.store(), state.paths(), current.name(), &hash)
        .await
        .map_err(|e| ApiError::store(e, "Failed to update password"))?;
    views::invalidate_users(state.cache()).await;

    Ok(StatusCode::NO_CONTENT)
}

/// An unreadable stored hash counts as a mismatch.
fn check_password(password: &str, stored: &str) -> Result<bool, ApiError> {
    match security::verify_password(password, stored) {
        Ok(verified) => Ok(verified),
        Err(security::SecurityError::Verification) => Ok(false),
        Err(err) => Err(ApiError::internal(err, "Failed to verify password")),
    }
}

async fn upgrade_legacy_hash(state: &AppState, user: &User, password: &str) {
    let hash = match security::hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::warn!(user = %user.name, error = %err, "Failed to rehash legacy password");
            return;
        }
    };
    match repositories::users::update_password(state.store(), state.paths(), &user.name, &hash).await {
        Ok(()) => tracing::info!(user = %user.name, "Upgraded legacy password hash"),
        Err(err) => {
            tracing::warn!(user = %user.name, error = %err, "Failed to store upgraded password hash")
        }
    }
}
