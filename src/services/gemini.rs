//! Client for the Gemini `generateContent` endpoint.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::db::models::VocabularyItem;

/// How many times a call site tries before giving up, and how long it waits in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay: Duration,
}

impl RetryPolicy {
    /// Waits `base_delay * 2^attempt` after each failed attempt.
    pub(crate) fn backoff(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    pub(crate) fn single_attempt() -> Self {
        Self { max_attempts: 1, base_delay: Duration::ZERO }
    }

    pub(crate) fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InlineAudio {
    pub(crate) data: Vec<u8>,
    pub(crate) mime_type: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    completion_policy: RetryPolicy,
}

impl GeminiClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let ai = settings.ai();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(ai.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: ai.gemini_api_key.clone(),
            base_url: ai.gemini_base_url.trim_end_matches('/').to_string(),
            model: ai.gemini_model.clone(),
            completion_policy: RetryPolicy::backoff(ai.max_attempts, Duration::from_secs(1)),
        })
    }

    /// Sends `parts` and returns the text of the first candidate, asking for a JSON body.
    async fn generate(&self, parts: Vec<Value>, policy: RetryPolicy, call_site: &'static str) -> Result<String> {
        if self.api_key.is_empty() {
            anyhow::bail!("GEMINI_API_KEY is not configured");
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let payload = json!({
            "contents": [{"parts": parts}],
            "generationConfig": {"responseMimeType": "application/json"}
        });
        let timer = Instant::now();
        let mut last_error = None;

        for attempt in 0..policy.max_attempts {
            match self.send_once(&url, &payload).await {
                Ok(text) => {
                    metrics::counter!("ai_requests_total", "call" => call_site, "outcome" => "ok")
                        .increment(1);
                    tracing::debug!(
                        call_site,
                        attempt,
                        elapsed_ms = timer.elapsed().as_millis() as u64,
                        "Gemini request succeeded"
                    );
                    return Ok(text);
                }
                Err(err) => {
                    tracing::warn!(call_site, attempt, error = %err, "Gemini request failed");
                    last_error = Some(err);
                }
            }

            if attempt + 1 < policy.max_attempts {
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
        }

        metrics::counter!("ai_requests_total", "call" => call_site, "outcome" => "error").increment(1);
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Gemini request was not attempted")))
    }

    async fn send_once(&self, url: &str, payload: &Value) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .context("Failed to call Gemini API")?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            anyhow::bail!("Gemini API error {status}: {body}");
        }
        candidate_text(&body).context("Missing Gemini candidate text")
    }

    /// Makes a single attempt.
    pub(crate) async fn transcribe(
        &self,
        audio: &InlineAudio,
        template: &str,
        options: &[String],
    ) -> Result<TranscriptionReply> {
        let prompt = format!(
            "A student read the sentence template \"{template}\" aloud, filling the blank with \
             one or more of these options: {}.\n\
             Return JSON: {{\"transcript\": \"what was said\", \"feedback\": \"short pronunciation \
             feedback\", \"correct_options\": [\"options that were clearly and correctly spoken\"]}}.\n\
             Only list options from the given list.",
            options.join(", ")
        );
        let parts = vec![
            json!({"text": prompt}),
            json!({
                "inline_data": {
                    "mime_type": audio.mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(&audio.data),
                }
            }),
        ];

        let text = self.generate(parts, RetryPolicy::single_attempt(), "transcribe").await?;
        serde_json::from_str(text.trim()).context("Failed to parse transcription JSON")
    }
}

fn candidate_text(body: &Value) -> Option<String> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TranscriptionReply {
    #[serde(default)]
    pub(crate) transcript: String,
    #[serde(default)]
    pub(crate) feedback: String,
    #[serde(default)]
    pub(crate) correct_options: Vec<String>,
}

/// One word as completed by the generator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct GeneratedWord {
    #[serde(rename = "English")]
    pub(crate) english: String,
    #[serde(rename = "POS", alias = "Group", default)]
    pub(crate) pos: String,
    #[serde(rename = "Chinese_1", default)]
    pub(crate) chinese_1: String,
    #[serde(rename = "Chinese_2", default)]
    pub(crate) chinese_2: String,
    #[serde(rename = "Example", default)]
    pub(crate) example: String,
}

#[async_trait]
pub(crate) trait VocabularyGenerator: Send + Sync {
    async fn complete_words(&self, words: &[String]) -> Result<Vec<GeneratedWord>>;
}

#[async_trait]
impl VocabularyGenerator for GeminiClient {
    async fn complete_words(&self, words: &[String]) -> Result<Vec<GeneratedWord>> {
        let prompt = format!(
            "Provide details for the following English words as a JSON array of objects.\n\
             Format: [{{\"English\": \"word\", \"Group\": \"part of speech\", \"Chinese_1\": \
             \"main Traditional Chinese meaning\", \"Chinese_2\": \"secondary meaning\", \
             \"Example\": \"an English example sentence\"}}, ...]\n\
             Words: {}\n\
             Return only the JSON, with no other text.",
            words.join(", ")
        );
        let text = self
            .generate(vec![json!({"text": prompt})], self.completion_policy, "complete_words")
            .await?;
        serde_json::from_str(text.trim()).context("Failed to parse vocabulary JSON")
    }
}

/// Splits newline-separated words, dropping blanks.
pub(crate) fn split_words(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|word| !word.is_empty()).map(String::from).collect()
}

/// Completed, unsaved records stamped with course and date. Generator failures yield an
/// empty preview.
pub(crate) async fn pending_vocabulary(
    generator: &dyn VocabularyGenerator,
    text: &str,
    course: &str,
    date: &str,
) -> Vec<VocabularyItem> {
    let words = split_words(text);
    if words.is_empty() {
        return Vec::new();
    }

    let generated = match generator.complete_words(&words).await {
        Ok(generated) => generated,
        Err(err) => {
            tracing::warn!(error = %err, words = words.len(), "Vocabulary completion failed");
            return Vec::new();
        }
    };

    generated
        .into_iter()
        .filter(|word| !word.english.trim().is_empty())
        .map(|word| {
            let mut item = VocabularyItem::new(word.english, word.chinese_1);
            item.pos = word.pos;
            item.chinese_2 = word.chinese_2;
            item.example = word.example;
            if !course.trim().is_empty() {
                item.course = course.to_string();
            }
            if !date.trim().is_empty() {
                item.date = date.to_string();
            }
            item
        })
        .collect()
}
