use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate_dataset_id;
use crate::core::state::AppState;
use crate::db::models::{SentenceCatalogEntry, SentenceItem, SentenceProgress};
use crate::repositories;
use crate::schemas::sentence::{
    AttemptRequest, AttemptResponse, BookScopesResponse, BookSummary, BooksResponse,
    CategorySummary, ItemsResponse, ProgressRequest, SentenceItemView, SummaryResponse,
};
use crate::schemas::vocabulary::ScopeQuery;
use crate::services::gemini::InlineAudio;
use crate::services::progress::{self, ProgressUpdate};
use crate::services::recognition::{RecognitionRequest, RecognitionSource, Recognizer};
use crate::services::scopes::{self, ScopeOption};
use crate::services::stats::{self, ProgressIndex};
use crate::services::views;

const WHOLE_BOOK_SCOPE: &str = "book";
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/:dataset_id/scopes", get(book_scopes))
        .route("/books/:dataset_id/items", get(book_items))
        .route("/books/:dataset_id/summary", get(book_summary))
        .route("/books/:dataset_id/items/:doc_id/progress", post(record_progress))
        .route("/books/:dataset_id/items/:doc_id/attempt", post(attempt))
}

/// The catalog entry of a book, or 404.
pub(crate) async fn find_book(
    state: &AppState,
    dataset_id: &str,
) -> Result<SentenceCatalogEntry, ApiError> {
    validate_dataset_id(dataset_id)?;
    views::catalog(state.store(), state.paths(), state.cache())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load sentence books"))?
        .into_iter()
        .find(|entry| entry.id == dataset_id)
        .ok_or_else(|| ApiError::NotFound(format!("Book {dataset_id}: not found")))
}

pub(crate) async fn load_book_items(
    state: &AppState,
    dataset_id: &str,
) -> Result<Vec<SentenceItem>, ApiError> {
    views::book_items(state.store(), state.paths(), state.cache(), dataset_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load sentences"))
}

async fn load_progress(
    state: &AppState,
    user: &str,
    dataset_id: &str,
) -> Result<Vec<SentenceProgress>, ApiError> {
    repositories::progress::list_for_dataset(state.store(), state.paths(), user, dataset_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load progress"))
}

async fn find_item(state: &AppState, dataset_id: &str, doc_id: &str) -> Result<SentenceItem, ApiError> {
    repositories::sentences::find_item(state.store(), state.paths(), dataset_id, doc_id)
        .await
        .map_err(|e| ApiError::store(e, &format!("Sentence {doc_id} in book {dataset_id}")))?
        .ok_or_else(|| ApiError::NotFound(format!("Sentence {doc_id} in book {dataset_id}: not found")))
}

async fn list_books(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<BooksResponse>, ApiError> {
    let catalog = views::catalog(state.store(), state.paths(), state.cache())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load sentence books"))?;

    let books = catalog
        .into_iter()
        .map(|entry| {
            let stat = current.user.sentence_stats.get(&entry.id).cloned();
            let fractions = stat.as_ref().and_then(|stat| {
                stats::stacked_fractions(stat.completed_count, stat.in_progress_count, stat.total_count)
            });
            BookSummary {
                id: entry.id,
                name: entry.name,
                last_updated: entry.last_updated,
                stat,
                fractions,
            }
        })
        .collect();

    Ok(Json(BooksResponse { books }))
}

async fn book_scopes(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(dataset_id): Path<String>,
) -> Result<Json<BookScopesResponse>, ApiError> {
    find_book(&state, &dataset_id).await?;
    let items = load_book_items(&state, &dataset_id).await?;
    let scopes = scopes::sentence_scopes(&items).iter().map(ScopeOption::from).collect();
    Ok(Json(BookScopesResponse { dataset_id, scopes }))
}

async fn book_items(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(dataset_id): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    find_book(&state, &dataset_id).await?;
    let scope = query
        .scope
        .filter(|key| !key.trim().is_empty())
        .unwrap_or_else(|| WHOLE_BOOK_SCOPE.to_string());
    let items = scopes::filter_sentences(load_book_items(&state, &dataset_id).await?, &scope);
    let records = load_progress(&state, current.name(), &dataset_id).await?;
    let index = ProgressIndex::new(&records);

    let items = items
        .into_iter()
        .map(|item| SentenceItemView {
            status: index.status_of(&item),
            completed_options: index.completed_for(&item).cloned().unwrap_or_default(),
            item,
        })
        .collect();

    Ok(Json(ItemsResponse { dataset_id, scope, items }))
}

async fn book_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(dataset_id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let book = find_book(&state, &dataset_id).await?;
    let items = load_book_items(&state, &dataset_id).await?;
    let records = load_progress(&state, current.name(), &dataset_id).await?;

    let mut by_category: BTreeMap<String, Vec<SentenceItem>> = BTreeMap::new();
    for item in &items {
        by_category.entry(item.category.clone()).or_default().push(item.clone());
    }
    let categories = by_category
        .into_iter()
        .map(|(category, items)| {
            let rollup = stats::rollup(&items, &records);
            CategorySummary {
                category,
                fractions: stats::stacked_fractions(
                    rollup.completed_count,
                    rollup.in_progress_count,
                    rollup.total_count,
                ),
                rollup,
            }
        })
        .collect();

    let rollup = stats::rollup(&items, &records);
    Ok(Json(SummaryResponse {
        dataset_id,
        name: book.name,
        fractions: stats::stacked_fractions(
            rollup.completed_count,
            rollup.in_progress_count,
            rollup.total_count,
        ),
        rollup,
        categories,
    }))
}

async fn record_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((dataset_id, doc_id)): Path<(String, String)>,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<ProgressUpdate>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    find_book(&state, &dataset_id).await?;
    let item = find_item(&state, &dataset_id, &doc_id).await?;

    let update = merge_progress(&state, current.name(), &dataset_id, &item, &payload.confirmed_options)
        .await?;
    Ok(Json(update))
}

async fn merge_progress(
    state: &AppState,
    user: &str,
    dataset_id: &str,
    item: &SentenceItem,
    confirmed: &[String],
) -> Result<ProgressUpdate, ApiError> {
    let update = progress::record_progress(
        state.store(),
        state.paths(),
        state.cache(),
        user,
        dataset_id,
        item,
        confirmed,
    )
    .await
    .map_err(|e| ApiError::store(e, "Failed to save progress"))?;
    tracing::info!(
        user,
        dataset_id,
        newly_completed = update.newly_completed.len(),
        stats_refreshed = update.stats_refreshed,
        "Sentence progress recorded"
    );
    Ok(update)
}

/// Runs recognition over a spoken attempt and records any confirmed options.
async fn attempt(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((dataset_id, doc_id)): Path<(String, String)>,
    Json(payload): Json<AttemptRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    find_book(&state, &dataset_id).await?;
    let item = find_item(&state, &dataset_id, &doc_id).await?;

    let audio = match payload.audio_base64.as_deref().map(str::trim).filter(|data| !data.is_empty()) {
        Some(encoded) => Some(InlineAudio {
            data: base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|_| ApiError::BadRequest("audio_base64 is not valid base64".to_string()))?,
            mime_type: payload
                .mime_type
                .clone()
                .filter(|mime| !mime.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string()),
        }),
        None => None,
    };
    let client_transcript = payload.transcript.filter(|text| !text.trim().is_empty());
    if audio.is_none() && client_transcript.is_none() {
        return Err(ApiError::BadRequest("Provide audio_base64 or transcript".to_string()));
    }

    let request = RecognitionRequest {
        template: item.template.clone(),
        options: item.options.clone(),
        audio,
        client_transcript,
    };
    let recognition = state
        .recognizer()
        .recognize(&request)
        .await
        .map_err(|e| ApiError::internal(e, "Recognition failed"))?;
    let source = match recognition.source {
        RecognitionSource::Primary => "primary",
        RecognitionSource::Secondary => "secondary",
        RecognitionSource::None => "none",
    };
    metrics::counter!("sentence_attempts_total", "source" => source).increment(1);

    let progress = if recognition.correct_options.is_empty() {
        None
    } else {
        Some(
            merge_progress(&state, current.name(), &dataset_id, &item, &recognition.correct_options)
                .await?,
        )
    };

    Ok(Json(AttemptResponse { recognition, progress }))
}

#[cfg(test)]
mod tests;
