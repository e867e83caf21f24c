use crate::core::security;
use crate::core::state::AppState;
use crate::repositories;
use crate::repositories::users::UpsertUser;
use crate::services::views;

/// Creates the configured admin account, or restores its admin flag and password.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let name = admin.first_admin_name.as_str();
    let existing = repositories::users::find(state.store(), state.paths(), name).await?;

    let password_hash = match &existing {
        Some(user)
            if security::verify_password(&admin.first_admin_password, &user.password_hash)
                .unwrap_or(false)
                && !security::needs_rehash(&user.password_hash) =>
        {
            None
        }
        _ => Some(security::hash_password(&admin.first_admin_password)?),
    };
    let is_admin = existing.as_ref().map_or(false, |user| user.is_admin);

    if existing.is_some() && is_admin && password_hash.is_none() {
        tracing::info!("Default admin already up to date");
        return Ok(());
    }

    repositories::users::upsert(
        state.store(),
        state.paths(),
        UpsertUser { name, student_id: None, password_hash, color: None, is_admin: Some(true) },
    )
    .await?;
    views::invalidate_users(state.cache()).await;

    if existing.is_some() {
        tracing::info!(name, "Updated default admin");
    } else {
        tracing::info!(name, "Created default admin");
    }
    Ok(())
}
