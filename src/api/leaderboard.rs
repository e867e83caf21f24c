use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::sentences::find_book;
use crate::core::state::AppState;
use crate::services::stats::{self, LeaderboardEntry};
use crate::services::views;

#[derive(Debug, Serialize)]
struct LeaderboardResponse {
    dataset_id: String,
    name: String,
    entries: Vec<LeaderboardEntry>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:dataset_id", get(leaderboard))
}

async fn leaderboard(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(dataset_id): Path<String>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let book = find_book(&state, &dataset_id).await?;
    let users = views::users(state.store(), state.paths(), state.cache())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load users"))?;
    let entries = stats::leaderboard(&users, &dataset_id);
    Ok(Json(LeaderboardResponse { dataset_id, name: book.name, entries }))
}
