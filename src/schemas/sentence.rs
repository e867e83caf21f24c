use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{DatasetStat, SentenceItem};
use crate::services::progress::ProgressUpdate;
use crate::services::recognition::Recognition;
use crate::services::scopes::ScopeOption;
use crate::services::stats::{DatasetRollup, SentenceStatus, StackedFractions};

#[derive(Debug, Serialize)]
pub(crate) struct BookSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) last_updated: Option<String>,
    pub(crate) stat: Option<DatasetStat>,
    pub(crate) fractions: Option<StackedFractions>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BooksResponse {
    pub(crate) books: Vec<BookSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BookScopesResponse {
    pub(crate) dataset_id: String,
    pub(crate) scopes: Vec<ScopeOption>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SentenceItemView {
    #[serde(flatten)]
    pub(crate) item: SentenceItem,
    pub(crate) status: Option<SentenceStatus>,
    pub(crate) completed_options: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ItemsResponse {
    pub(crate) dataset_id: String,
    pub(crate) scope: String,
    pub(crate) items: Vec<SentenceItemView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CategorySummary {
    pub(crate) category: String,
    pub(crate) rollup: DatasetRollup,
    pub(crate) fractions: Option<StackedFractions>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SummaryResponse {
    pub(crate) dataset_id: String,
    pub(crate) name: String,
    pub(crate) rollup: DatasetRollup,
    pub(crate) fractions: Option<StackedFractions>,
    pub(crate) categories: Vec<CategorySummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProgressRequest {
    #[serde(alias = "confirmedOptions")]
    #[validate(length(min = 1, message = "confirmed_options must not be empty"))]
    pub(crate) confirmed_options: Vec<String>,
}

/// A spoken attempt: base64 audio for the primary recognizer and/or a transcript produced
/// on the client.
#[derive(Debug, Deserialize)]
pub(crate) struct AttemptRequest {
    #[serde(default, alias = "audioBase64")]
    pub(crate) audio_base64: Option<String>,
    #[serde(default, alias = "mimeType")]
    pub(crate) mime_type: Option<String>,
    #[serde(default)]
    pub(crate) transcript: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) recognition: Recognition,
    pub(crate) progress: Option<ProgressUpdate>,
}
