use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{VocabularyItem, NO_DATE, UNCATEGORIZED};
use crate::db::store::Writes;
use crate::services::scopes::ScopeOption;
use crate::services::stats::VocabularyMetrics;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopeQuery {
    #[serde(default)]
    pub(crate) scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestQuery {
    #[serde(default)]
    pub(crate) scope: Option<String>,
    #[serde(default)]
    pub(crate) size: Option<usize>,
    #[serde(default)]
    pub(crate) seed: Option<u64>,
}

/// One word to save. Practice counters start at zero.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub(crate) struct VocabularyDraft {
    #[serde(rename = "English")]
    #[validate(length(min = 1, message = "English must not be empty"))]
    pub(crate) english: String,
    #[serde(rename = "POS", alias = "Group", default)]
    pub(crate) pos: String,
    #[serde(rename = "Chinese_1")]
    #[validate(length(min = 1, message = "Chinese_1 must not be empty"))]
    pub(crate) chinese_1: String,
    #[serde(rename = "Chinese_2", default)]
    pub(crate) chinese_2: String,
    #[serde(rename = "Example", default)]
    pub(crate) example: String,
    #[serde(rename = "Course", default)]
    pub(crate) course: String,
    #[serde(rename = "Date", default)]
    pub(crate) date: String,
}

impl VocabularyDraft {
    pub(crate) fn into_item(self) -> VocabularyItem {
        let mut item = VocabularyItem::new(self.english.trim(), self.chinese_1.trim());
        item.pos = self.pos;
        item.chinese_2 = self.chinese_2;
        item.example = self.example;
        if !self.course.trim().is_empty() {
            item.course = self.course.trim().to_string();
        }
        if !self.date.trim().is_empty() {
            item.date = self.date.trim().to_string();
        }
        item
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct VocabularyCreate {
    #[validate(length(min = 1, message = "items must not be empty"), nested)]
    pub(crate) items: Vec<VocabularyDraft>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GenerateRequest {
    #[validate(length(min = 1, message = "words must not be empty"))]
    pub(crate) words: String,
    #[serde(default)]
    pub(crate) course: String,
    #[serde(default)]
    pub(crate) date: String,
}

/// Descriptive fields of an existing word; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct VocabularyUpdate {
    #[serde(rename = "English", default)]
    pub(crate) english: Option<String>,
    #[serde(rename = "POS", alias = "Group", default)]
    pub(crate) pos: Option<String>,
    #[serde(rename = "Chinese_1", default)]
    pub(crate) chinese_1: Option<String>,
    #[serde(rename = "Chinese_2", default)]
    pub(crate) chinese_2: Option<String>,
    #[serde(rename = "Example", default)]
    pub(crate) example: Option<String>,
    #[serde(rename = "Course", default)]
    pub(crate) course: Option<String>,
    #[serde(rename = "Date", default)]
    pub(crate) date: Option<String>,
}

impl VocabularyUpdate {
    /// `Err` names a required field that was set blank.
    pub(crate) fn into_writes(self) -> Result<Writes, &'static str> {
        let mut writes = Writes::new();
        for (field, value) in [("English", self.english), ("Chinese_1", self.chinese_1)] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(field);
                }
                writes = writes.put(field, value.trim());
            }
        }
        for (field, value) in
            [("POS", self.pos), ("Chinese_2", self.chinese_2), ("Example", self.example)]
        {
            if let Some(value) = value {
                writes = writes.put(field, value);
            }
        }
        if let Some(course) = self.course {
            let course = course.trim();
            writes = writes.put("Course", if course.is_empty() { UNCATEGORIZED } else { course });
        }
        if let Some(date) = self.date {
            let date = date.trim();
            writes = writes.put("Date", if date.is_empty() { NO_DATE } else { date });
        }
        Ok(writes)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct DeleteRequest {
    #[validate(length(min = 1, message = "ids must not be empty"))]
    pub(crate) ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    #[serde(default)]
    pub(crate) answer: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct VocabularyListResponse {
    pub(crate) scope: String,
    pub(crate) items: Vec<VocabularyItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScopesResponse {
    pub(crate) scopes: Vec<ScopeOption>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseMetrics {
    pub(crate) course: String,
    pub(crate) metrics: VocabularyMetrics,
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    pub(crate) scope: String,
    pub(crate) metrics: VocabularyMetrics,
    pub(crate) courses: Vec<CourseMetrics>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PendingResponse {
    pub(crate) items: Vec<VocabularyItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedResponse {
    pub(crate) created: usize,
    pub(crate) items: Vec<VocabularyItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportResponse {
    pub(crate) imported: usize,
    pub(crate) skipped: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeletedResponse {
    pub(crate) deleted: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct TestPoolResponse {
    pub(crate) scope: String,
    pub(crate) items: Vec<VocabularyItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) correct: bool,
    pub(crate) expected: String,
    pub(crate) item: VocabularyItem,
}
