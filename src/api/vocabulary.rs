use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::upload::read_csv_upload;
use crate::core::state::AppState;
use crate::core::time::today_iso;
use crate::db::models::VocabularyItem;
use crate::repositories;
use crate::schemas::vocabulary::{
    AnswerRequest, AnswerResponse, CourseMetrics, CreatedResponse, DashboardResponse,
    DeleteRequest, DeletedResponse, GenerateRequest, ImportResponse, PendingResponse,
    ScopeQuery, ScopesResponse, TestPoolResponse, TestQuery, VocabularyCreate,
    VocabularyListResponse, VocabularyUpdate,
};
use crate::services::scopes::ScopeOption;
use crate::services::{csv_import, gemini, practice, scopes, stats};

const ALL_SCOPE: &str = "all";
const MAX_TEST_SIZE: usize = 100;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vocabulary).post(create_vocabulary))
        .route("/scopes", get(list_scopes))
        .route("/dashboard", get(dashboard))
        .route("/generate", post(generate))
        .route("/import", post(import_csv))
        .route("/delete", post(delete_vocabulary))
        .route("/test", get(test_pool))
        .route("/:id", patch(update_vocabulary))
        .route("/:id/answer", post(submit_answer))
}

async fn load_items(state: &AppState, user: &str) -> Result<Vec<VocabularyItem>, ApiError> {
    repositories::vocabulary::list(state.store(), state.paths(), user)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load vocabulary"))
}

fn scope_key(scope: Option<String>) -> String {
    scope.filter(|key| !key.trim().is_empty()).unwrap_or_else(|| ALL_SCOPE.to_string())
}

async fn list_vocabulary(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<VocabularyListResponse>, ApiError> {
    let scope = scope_key(query.scope);
    let items = scopes::filter_vocabulary(load_items(&state, current.name()).await?, &scope);
    Ok(Json(VocabularyListResponse { scope, items }))
}

async fn list_scopes(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<ScopesResponse>, ApiError> {
    let items = load_items(&state, current.name()).await?;
    let scopes = scopes::vocabulary_scopes(&items).iter().map(ScopeOption::from).collect();
    Ok(Json(ScopesResponse { scopes }))
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let scope = scope_key(query.scope);
    let items = scopes::filter_vocabulary(load_items(&state, current.name()).await?, &scope);

    let mut by_course: BTreeMap<&str, Vec<VocabularyItem>> = BTreeMap::new();
    for item in &items {
        by_course.entry(item.course.as_str()).or_default().push(item.clone());
    }
    let courses = by_course
        .into_iter()
        .map(|(course, items)| CourseMetrics {
            course: course.to_string(),
            metrics: stats::vocabulary_metrics(&items),
        })
        .collect();

    Ok(Json(DashboardResponse { metrics: stats::vocabulary_metrics(&items), scope, courses }))
}

async fn create_vocabulary(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<VocabularyCreate>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let items = payload.items.into_iter().map(|draft| draft.into_item()).collect();
    let created =
        repositories::vocabulary::create_many(state.store(), state.paths(), current.name(), items)
            .await
            .map_err(|e| ApiError::batch(e, "Failed to save vocabulary"))?;
    tracing::info!(user = %current.name(), count = created.len(), "Vocabulary saved");

    Ok((StatusCode::CREATED, Json(CreatedResponse { created: created.len(), items: created })))
}

/// Returns completed, unsaved records; saving them is a separate create. A blank date
/// stamps today's.
async fn generate(
    State(state): State<AppState>,
    _current: CurrentUser,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<PendingResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let date = match payload.date.trim() {
        "" => today_iso(),
        date => date.to_string(),
    };
    let items =
        gemini::pending_vocabulary(state.generator(), &payload.words, payload.course.trim(), &date)
            .await;
    Ok(Json(PendingResponse { items }))
}

async fn import_csv(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let import_settings = state.settings().import();
    let upload = read_csv_upload(multipart, import_settings.max_upload_size_mb).await?;
    let default_course =
        upload.field("course").unwrap_or(import_settings.default_course.as_str()).to_string();

    let parsed = csv_import::parse_vocabulary(upload.contents.as_slice(), &default_course)?;
    let skipped = parsed.skipped;
    let created = repositories::vocabulary::create_many(
        state.store(),
        state.paths(),
        current.name(),
        parsed.records,
    )
    .await
    .map_err(|e| ApiError::batch(e, "Failed to import vocabulary"))?;
    tracing::info!(
        user = %current.name(),
        file = upload.file_name.as_deref().unwrap_or("-"),
        imported = created.len(),
        skipped,
        "Vocabulary CSV imported"
    );

    Ok((StatusCode::CREATED, Json(ImportResponse { imported: created.len(), skipped })))
}

async fn update_vocabulary(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<VocabularyUpdate>,
) -> Result<Json<VocabularyItem>, ApiError> {
    let writes = payload
        .into_writes()
        .map_err(|field| ApiError::BadRequest(format!("{field} must not be empty")))?;
    repositories::vocabulary::update_fields(state.store(), state.paths(), current.name(), &id, writes)
        .await
        .map_err(|e| ApiError::store(e, &format!("Word {id}")))?;

    repositories::vocabulary::find(state.store(), state.paths(), current.name(), &id)
        .await
        .map_err(|e| ApiError::store(e, &format!("Word {id}")))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Word {id}: not found")))
}

async fn delete_vocabulary(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<DeleteRequest>,
) -> Result<Json<DeletedResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let outcome = repositories::vocabulary::delete_many(
        state.store(),
        state.paths(),
        current.name(),
        &payload.ids,
    )
    .await
    .map_err(|e| ApiError::batch(e, "Failed to delete vocabulary"))?;
    Ok(Json(DeletedResponse { deleted: outcome.operations }))
}

async fn test_pool(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TestQuery>,
) -> Result<Json<TestPoolResponse>, ApiError> {
    let scope = scope_key(query.scope);
    let size = query.size.unwrap_or(practice::DEFAULT_TEST_SIZE).min(MAX_TEST_SIZE);
    let items = scopes::filter_vocabulary(load_items(&state, current.name()).await?, &scope);
    let items = practice::sample_test_pool(&items, size, query.seed);
    Ok(Json(TestPoolResponse { scope, items }))
}

async fn submit_answer(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let mut item = repositories::vocabulary::find(state.store(), state.paths(), current.name(), &id)
        .await
        .map_err(|e| ApiError::store(e, &format!("Word {id}")))?
        .ok_or_else(|| ApiError::NotFound(format!("Word {id}: not found")))?;

    let correct = practice::judge_answer(&payload.answer, &item.chinese_1);
    item.record_attempt(correct);
    repositories::vocabulary::save_counts(state.store(), state.paths(), current.name(), &item)
        .await
        .map_err(|e| ApiError::store(e, &format!("Word {id}")))?;
    metrics::counter!(
        "vocabulary_answers_total",
        "outcome" => if correct { "correct" } else { "incorrect" }
    )
    .increment(1);

    Ok(Json(AnswerResponse { correct, expected: item.chinese_1.clone(), item }))
}
