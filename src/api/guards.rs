use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims};
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;

/// Per-request session: the verified token claims and the user they name.
pub(crate) struct CurrentUser {
    pub(crate) user: User,
    pub(crate) claims: Claims,
}

impl CurrentUser {
    pub(crate) fn name(&self) -> &str {
        &self.user.name
    }
}

pub(crate) struct CurrentAdmin(pub(crate) CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let revoked = app_state
            .redis()
            .exists(&security::revoked_token_key(&claims.jti))
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Token revocation check failed");
                false
            });
        if revoked {
            return Err(ApiError::Unauthorized("Session has ended"));
        }

        let user = repositories::users::find(app_state.store(), app_state.paths(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        Ok(CurrentUser { user, claims })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.user.is_admin {
            Ok(CurrentAdmin(current))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}
