//! Two-stage option recognition for spoken sentence drills.
//!
//! The primary stage sends the recording to Gemini. When it fails or confirms nothing, the
//! secondary stage matches the options against a transcript produced on the client.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::services::gemini::{GeminiClient, InlineAudio};

#[derive(Debug, Clone)]
pub(crate) struct RecognitionRequest {
    pub(crate) template: String,
    pub(crate) options: Vec<String>,
    pub(crate) audio: Option<InlineAudio>,
    pub(crate) client_transcript: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RecognitionSource {
    Primary,
    Secondary,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Recognition {
    pub(crate) transcript: String,
    pub(crate) feedback: String,
    pub(crate) correct_options: Vec<String>,
    pub(crate) source: RecognitionSource,
}

impl Recognition {
    fn empty() -> Self {
        Self {
            transcript: String::new(),
            feedback: String::new(),
            correct_options: Vec::new(),
            source: RecognitionSource::None,
        }
    }
}

#[async_trait]
pub(crate) trait Recognizer: Send + Sync {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition>;
}

/// Keeps the options of `found` that belong to the item, in item order.
fn restrict_to_options(found: &[String], options: &[String]) -> Vec<String> {
    options.iter().filter(|option| found.iter().any(|hit| hit.trim() == option.as_str())).cloned().collect()
}

pub(crate) struct GeminiRecognizer {
    client: Arc<GeminiClient>,
}

impl GeminiRecognizer {
    pub(crate) fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Recognizer for GeminiRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition> {
        let Some(audio) = &request.audio else {
            anyhow::bail!("no audio attached");
        };
        let reply = self.client.transcribe(audio, &request.template, &request.options).await?;
        Ok(Recognition {
            correct_options: restrict_to_options(&reply.correct_options, &request.options),
            transcript: reply.transcript,
            feedback: reply.feedback,
            source: RecognitionSource::Primary,
        })
    }
}

/// Matches options as whole-word sequences of a client-supplied transcript.
pub(crate) struct TranscriptMatcher;

/// Han and kana are written without spaces, so each of those characters is its own token.
fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2FA1F
    )
}

fn words(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if is_cjk(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() || c == '\'' {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

#[async_trait]
impl Recognizer for TranscriptMatcher {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition> {
        let transcript = request.client_transcript.clone().unwrap_or_default();
        let spoken = words(&transcript);
        let correct_options = request
            .options
            .iter()
            .filter(|option| contains_sequence(&spoken, &words(option)))
            .cloned()
            .collect();
        Ok(Recognition {
            transcript,
            feedback: String::new(),
            correct_options,
            source: RecognitionSource::Secondary,
        })
    }
}

/// Tries the primary recognizer, then the secondary when the first fails or confirms no
/// option. The primary transcript text wins when present.
pub(crate) struct TwoStageRecognizer {
    primary: Arc<dyn Recognizer>,
    secondary: Arc<dyn Recognizer>,
}

impl TwoStageRecognizer {
    pub(crate) fn new(primary: Arc<dyn Recognizer>, secondary: Arc<dyn Recognizer>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Recognizer for TwoStageRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition> {
        let primary = match self.primary.recognize(request).await {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(error = %err, "Primary recognition failed; trying transcript matching");
                None
            }
        };
        if let Some(result) = &primary {
            if !result.correct_options.is_empty() {
                return Ok(result.clone());
            }
        }

        let secondary = match self.secondary.recognize(request).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "Secondary recognition failed");
                Recognition::empty()
            }
        };

        let mut result = primary.unwrap_or_else(Recognition::empty);
        if result.transcript.trim().is_empty() {
            result.transcript = secondary.transcript;
        }
        if !secondary.correct_options.is_empty() {
            result.correct_options = restrict_to_options(&secondary.correct_options, &request.options);
            result.source = RecognitionSource::Secondary;
        }
        Ok(result)
    }
}
