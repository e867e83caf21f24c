pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::gemini::GeminiClient;
use crate::services::recognition::{GeminiRecognizer, TranscriptMatcher, TwoStageRecognizer};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let store = db::connect_store(&settings).await?;
    tracing::info!(backend = store.backend_name(), "Document store ready");

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without cache");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let gemini = Arc::new(GeminiClient::from_settings(&settings)?);
    if settings.ai().gemini_api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY is not set; vocabulary completion and audio recognition are disabled");
    }
    let recognizer = TwoStageRecognizer::new(
        Arc::new(GeminiRecognizer::new(gemini.clone())),
        Arc::new(TranscriptMatcher),
    );
    let state = AppState::new(settings, store, redis.clone(), gemini, Arc::new(recognizer));

    if let Err(err) = core::bootstrap::ensure_admin(&state).await {
        tracing::error!(error = %err, "Failed to ensure the first admin account");
    }
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Flashcard API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
