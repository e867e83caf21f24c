use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::sentences::{find_book, load_book_items};
use crate::api::upload::read_csv_upload;
use crate::api::validation::{validate_color, validate_dataset_id, validate_key, validate_password_len};
use crate::core::security;
use crate::core::state::AppState;
use crate::repositories;
use crate::repositories::users::UpsertUser;
use crate::schemas::admin::{
    AdminUserCreate, AdminUserUpdate, BookImportResponse, BookItemsResponse,
    CatalogScopesResponse, ItemsDeleteRequest, ItemsSaveRequest, ItemsSaveResponse, UsersResponse,
};
use crate::schemas::user::UserResponse;
use crate::schemas::vocabulary::{DeletedResponse, ScopeQuery};
use crate::services::stats::UserSummary;
use crate::services::{csv_import, scopes, views};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:name", patch(update_user).delete(delete_user))
        .route("/books/scopes", get(catalog_scopes))
        .route("/books/import", post(import_book))
        .route("/books/:dataset_id/items", get(book_items))
        .route("/books/:dataset_id/items/save", post(save_items))
        .route("/books/:dataset_id/items/delete", post(delete_items))
}

async fn list_users(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = repositories::users::list(state.store(), state.paths())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load users"))?
        .into_iter()
        .map(UserSummary::from)
        .collect();
    Ok(Json(UsersResponse { users }))
}

async fn load_user(state: &AppState, name: &str) -> Result<UserResponse, ApiError> {
    repositories::users::find(state.store(), state.paths(), name)
        .await
        .map_err(|e| ApiError::store(e, "User"))?
        .map(UserResponse::from_db)
        .ok_or_else(|| ApiError::NotFound(format!("User {name}: not found")))
}

/// Merge-sets the account, so an existing name is updated in place.
async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let name = payload.name.trim();
    validate_key("name", name)?;
    validate_password_len(&payload.password)?;
    validate_color(&payload.color)?;

    let password_hash = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    repositories::users::upsert(
        state.store(),
        state.paths(),
        UpsertUser {
            name,
            student_id: Some(payload.student_id.trim()),
            password_hash: Some(password_hash),
            color: Some(payload.color.as_str()),
            is_admin: Some(payload.is_admin),
        },
    )
    .await
    .map_err(|e| ApiError::store(e, "Failed to save user"))?;
    views::invalidate_users(state.cache()).await;
    tracing::info!(admin = %admin.name(), user = %name, "User saved");

    Ok((StatusCode::CREATED, Json(load_user(&state, name).await?)))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(name): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    load_user(&state, &name).await?;
    if let Some(color) = &payload.color {
        validate_color(color)?;
    }
    let password_hash = match payload.password.as_deref() {
        Some(password) => {
            validate_password_len(password)?;
            Some(
                security::hash_password(password)
                    .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
            )
        }
        None => None,
    };
    if payload.is_admin == Some(false) && name == admin.name() {
        return Err(ApiError::BadRequest("Cannot remove your own admin access".to_string()));
    }

    repositories::users::upsert(
        state.store(),
        state.paths(),
        UpsertUser {
            name: &name,
            student_id: payload.student_id.as_deref().map(str::trim),
            password_hash,
            color: payload.color.as_deref(),
            is_admin: payload.is_admin,
        },
    )
    .await
    .map_err(|e| ApiError::store(e, "Failed to update user"))?;
    views::invalidate_users(state.cache()).await;
    tracing::info!(admin = %admin.name(), user = %name, "User updated");

    Ok(Json(load_user(&state, &name).await?))
}

/// Removes the account document only; the user's vocabulary and progress stay behind.
async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if name == admin.name() {
        return Err(ApiError::BadRequest("Cannot delete your own account".to_string()));
    }
    load_user(&state, &name).await?;
    repositories::users::delete(state.store(), state.paths(), &name)
        .await
        .map_err(|e| ApiError::store(e, "Failed to delete user"))?;
    views::invalidate_users(state.cache()).await;
    tracing::info!(admin = %admin.name(), user = %name, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn catalog_scopes(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<CatalogScopesResponse>, ApiError> {
    let catalog = views::catalog(state.store(), state.paths(), state.cache())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load sentence books"))?;
    let mut books = Vec::with_capacity(catalog.len());
    for entry in catalog {
        let items = load_book_items(&state, &entry.id).await?;
        books.push((entry, items));
    }
    Ok(Json(CatalogScopesResponse { scopes: scopes::catalog_scopes(&books) }))
}

/// Imports a sentence CSV into a new or existing book. Form fields: `dataset_id`,
/// optional `name`, and the `file`.
async fn import_book(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BookImportResponse>), ApiError> {
    let upload = read_csv_upload(multipart, state.settings().import().max_upload_size_mb).await?;
    let dataset_id = upload
        .field("dataset_id")
        .ok_or_else(|| ApiError::BadRequest("dataset_id is required".to_string()))?
        .to_string();
    validate_dataset_id(&dataset_id)?;

    let parsed = csv_import::parse_sentences(upload.contents.as_slice())?;
    let existing = repositories::sentences::find_catalog_entry(state.store(), state.paths(), &dataset_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load sentence book"))?;
    let name = upload
        .field("name")
        .map(str::to_string)
        .or_else(|| existing.map(|entry| entry.name))
        .unwrap_or_else(|| dataset_id.clone());

    repositories::sentences::upsert_catalog_entry(state.store(), state.paths(), &dataset_id, &name)
        .await
        .map_err(|e| ApiError::store(e, "Failed to save sentence book"))?;
    let outcome = repositories::sentences::save_items(
        state.store(),
        state.paths(),
        &dataset_id,
        parsed.records,
    )
    .await;
    views::invalidate_book(state.cache(), &dataset_id).await;
    let outcome = outcome.map_err(|e| ApiError::batch(e, "Failed to import sentences"))?;

    let skipped = parsed.skipped + outcome.skipped;
    tracing::info!(
        admin = %admin.name(),
        dataset_id = %dataset_id,
        file = upload.file_name.as_deref().unwrap_or("-"),
        imported = outcome.created,
        skipped,
        "Sentence book imported"
    );

    Ok((
        StatusCode::CREATED,
        Json(BookImportResponse { dataset_id, name, imported: outcome.created, skipped }),
    ))
}

async fn book_items(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(dataset_id): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<BookItemsResponse>, ApiError> {
    find_book(&state, &dataset_id).await?;
    let scope = query.scope.filter(|key| !key.trim().is_empty()).unwrap_or_else(|| "book".to_string());
    let items = scopes::filter_sentences(load_book_items(&state, &dataset_id).await?, &scope);
    Ok(Json(BookItemsResponse { dataset_id, scope, items }))
}

async fn save_items(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(dataset_id): Path<String>,
    Json(payload): Json<ItemsSaveRequest>,
) -> Result<Json<ItemsSaveResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    find_book(&state, &dataset_id).await?;

    let items = payload.items.into_iter().map(|edit| edit.into_item()).collect();
    let outcome =
        repositories::sentences::save_items(state.store(), state.paths(), &dataset_id, items).await;
    views::invalidate_book(state.cache(), &dataset_id).await;
    let outcome = outcome.map_err(|e| ApiError::batch(e, "Failed to save sentences"))?;
    tracing::info!(
        admin = %admin.name(),
        dataset_id = %dataset_id,
        updated = outcome.updated,
        created = outcome.created,
        skipped = outcome.skipped,
        "Sentence edits saved"
    );

    Ok(Json(ItemsSaveResponse {
        updated: outcome.updated,
        created: outcome.created,
        skipped: outcome.skipped,
    }))
}

async fn delete_items(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(dataset_id): Path<String>,
    Json(payload): Json<ItemsDeleteRequest>,
) -> Result<Json<DeletedResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    find_book(&state, &dataset_id).await?;

    let outcome =
        repositories::sentences::delete_items(state.store(), state.paths(), &dataset_id, &payload.doc_ids)
            .await;
    views::invalidate_book(state.cache(), &dataset_id).await;
    let outcome = outcome.map_err(|e| ApiError::batch(e, "Failed to delete sentences"))?;
    tracing::info!(
        admin = %admin.name(),
        dataset_id = %dataset_id,
        deleted = outcome.operations,
        "Sentences deleted"
    );

    Ok(Json(DeletedResponse { deleted: outcome.operations }))
}

#[cfg(test)]
mod tests;
