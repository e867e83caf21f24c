use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, redis::RedisHandle, security, state::AppState};
use crate::db::memory::MemoryDocumentStore;
use crate::repositories;
use crate::repositories::users::UpsertUser;
use crate::services::gemini::{GeneratedWord, VocabularyGenerator};
use crate::services::recognition::{
    Recognition, RecognitionRequest, Recognizer, TranscriptMatcher, TwoStageRecognizer,
};

const TEST_SECRET_KEY: &str = "test-secret";
pub(crate) const TEST_APP_ID: &str = "test-app";
pub(crate) const TEST_ADMIN_PASSWORD: &str = "admin-password";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("FLASHCARD_ENV", "test");
    std::env::set_var("FLASHCARD_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("STORE_BACKEND", "memory");
    std::env::set_var("FLASHCARD_APP_ID", TEST_APP_ID);
    std::env::set_var("REDIS_HOST", "127.0.0.1");
    std::env::set_var("REDIS_PORT", "6379");
    std::env::remove_var("REDIS_PASSWORD");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::set_var("FIRST_ADMIN_NAME", "admin");
    std::env::set_var("FIRST_ADMIN_PASSWORD", TEST_ADMIN_PASSWORD);
    std::env::remove_var("GEMINI_API_KEY");
    std::env::remove_var("AI_MAX_ATTEMPTS");
    std::env::remove_var("LOGIN_RATE_LIMIT");
    std::env::remove_var("IMPORT_DEFAULT_COURSE");
    std::env::remove_var("MAX_UPLOAD_SIZE_MB");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("PROJECT_NAME");
}

/// Echoes each word back with a predictable meaning.
pub(crate) struct EchoGenerator;

#[async_trait]
impl VocabularyGenerator for EchoGenerator {
    async fn complete_words(&self, words: &[String]) -> Result<Vec<GeneratedWord>> {
        Ok(words
            .iter()
            .map(|word| GeneratedWord {
                english: word.clone(),
                pos: "n.".to_string(),
                chinese_1: format!("{word}-zh"),
                chinese_2: String::new(),
                example: format!("This is {word}."),
            })
            .collect())
    }
}

/// A primary recognizer that is always down, so requests exercise the transcript fallback.
pub(crate) struct OfflineRecognizer;

#[async_trait]
impl Recognizer for OfflineRecognizer {
    async fn recognize(&self, _request: &RecognitionRequest) -> Result<Recognition> {
        anyhow::bail!("recognition service offline")
    }
}

/// A fresh in-memory store, a Redis handle that is never connected and stub AI
/// collaborators.
pub(crate) fn build_state(settings: Settings) -> AppState {
    let redis = RedisHandle::new(settings.redis().redis_url());
    let recognizer =
        TwoStageRecognizer::new(Arc::new(OfflineRecognizer), Arc::new(TranscriptMatcher));
    AppState::new(
        settings,
        Arc::new(MemoryDocumentStore::new()),
        redis,
        Arc::new(EchoGenerator),
        Arc::new(recognizer),
    )
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let state = build_state(settings);
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

pub(crate) async fn insert_user_with_hash(
    state: &AppState,
    name: &str,
    password_hash: String,
    is_admin: bool,
) {
    repositories::users::upsert(
        state.store(),
        state.paths(),
        UpsertUser {
            name,
            student_id: Some("S-001"),
            password_hash: Some(password_hash),
            color: None,
            is_admin: Some(is_admin),
        },
    )
    .await
    .expect("insert user");
}

pub(crate) async fn insert_user(state: &AppState, name: &str, password: &str) {
    let hash = security::hash_password(password).expect("hash password");
    insert_user_with_hash(state, name, hash, false).await;
}

pub(crate) async fn insert_admin(state: &AppState, name: &str, password: &str) {
    let hash = security::hash_password(password).expect("hash password");
    insert_user_with_hash(state, name, hash, true).await;
}

pub(crate) fn bearer_token(name: &str, settings: &Settings) -> String {
    security::create_access_token(name, settings, None).expect("token")
}

pub(crate) fn api_path(settings: &Settings, path: &str) -> String {
    format!("{}{path}", settings.api().api_v1_str)
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

/// A `multipart/form-data` POST with text fields and one file part named `file`.
pub(crate) fn multipart_request(
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    file_name: &str,
    file_contents: &[u8],
) -> Request<Body> {
    const BOUNDARY: &str = "flashcard-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("multipart body")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
