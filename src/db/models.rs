//! Typed records decoded at the store boundary.
//!
//! Documents written by older tooling are loosely typed (counts stored as strings or
//! floats, options stored as a pipe-delimited string, `POS` stored as `Group`), so the
//! decoders here accept those shapes and fill documented defaults for missing fields.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::db::store::{Document, Fields, StoreError, Writes};

pub(crate) const UNCATEGORIZED: &str = "Uncategorized";
pub(crate) const NO_DATE: &str = "N/A";
pub(crate) const DEFAULT_ORDER: i64 = 9999;
pub(crate) const DEFAULT_COLOR: &str = "#1E90FF";

fn default_course() -> String {
    UNCATEGORIZED.to_string()
}

fn default_date() -> String {
    NO_DATE.to_string()
}

fn default_order() -> i64 {
    DEFAULT_ORDER
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    })
}

/// A blank category, course or date falls back to its sentinel.
fn string_or<'de, D: Deserializer<'de>>(
    deserializer: D,
    fallback: &str,
) -> Result<String, D::Error> {
    let text = lenient_string(deserializer)?;
    if text.trim().is_empty() {
        Ok(fallback.to_string())
    } else {
        Ok(text)
    }
}

fn course_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, UNCATEGORIZED)
}

fn date_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, NO_DATE)
}

fn optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let text = lenient_string(deserializer)?;
    Ok((!text.is_empty()).then_some(text))
}

pub(crate) fn count_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>().ok().or_else(|| {
                text.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)
            })
        }
        _ => None,
    }
}

/// Counters tolerate strings and floats; anything unreadable counts as zero.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value).map(|count| count.min(u64::from(u32::MAX)) as u32).unwrap_or(0))
}

fn lenient_order<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
            .unwrap_or(DEFAULT_ORDER),
        Value::String(text) => text.trim().parse().unwrap_or(DEFAULT_ORDER),
        _ => DEFAULT_ORDER,
    })
}

/// Splits a pipe-delimited option string, dropping blanks.
pub(crate) fn split_options(raw: &str) -> Vec<String> {
    raw.split('|').map(str::trim).filter(|option| !option.is_empty()).map(String::from).collect()
}

fn lenient_options<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .filter(|option| !option.is_empty())
            .collect(),
        Value::String(text) => split_options(&text),
        _ => Vec::new(),
    })
}

fn lenient_option_set<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeSet<String>, D::Error> {
    lenient_options(deserializer).map(|options| options.into_iter().collect())
}

fn lenient_stats<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, DatasetStat>, D::Error> {
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(dataset_id, value)| {
            serde_json::from_value::<DatasetStat>(value).ok().map(|stat| (dataset_id, stat))
        })
        .collect())
}

fn decode<T: DeserializeOwned>(collection: &str, document: &Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document.fields.clone())).map_err(|err| {
        StoreError::Malformed {
            collection: collection.to_string(),
            id: document.id.clone(),
            reason: err.to_string(),
        }
    })
}

/// Decodes every document of a listing, skipping (and logging) the malformed ones.
pub(crate) fn decode_all<T>(
    collection: &str,
    documents: Vec<Document>,
    decode_one: impl Fn(&str, &Document) -> Result<T, StoreError>,
) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match decode_one(collection, document) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(collection, id = %document.id, error = %err, "Skipping malformed document");
                None
            }
        })
        .collect()
}

fn to_fields<T: Serialize>(record: &T) -> Fields {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields,
        _ => Fields::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DatasetStat {
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) dataset_name: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub(crate) total_count: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub(crate) completed_count: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub(crate) in_progress_count: u32,
    #[serde(default, deserialize_with = "optional_string")]
    pub(crate) last_active: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct User {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(rename = "id", default, deserialize_with = "lenient_string")]
    pub(crate) student_id: String,
    #[serde(rename = "password", skip_serializing)]
    pub(crate) password_hash: String,
    #[serde(default = "default_color", deserialize_with = "lenient_string")]
    pub(crate) color: String,
    #[serde(default)]
    pub(crate) is_admin: bool,
    #[serde(default, deserialize_with = "lenient_stats")]
    pub(crate) sentence_stats: BTreeMap<String, DatasetStat>,
}

impl User {
    /// The document key is the user name.
    pub(crate) fn from_document(collection: &str, document: &Document) -> Result<Self, StoreError> {
        let mut user: Self = decode(collection, document)?;
        user.name = document.id.clone();
        Ok(user)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct VocabularyItem {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(rename = "English", deserialize_with = "lenient_string")]
    pub(crate) english: String,
    #[serde(rename = "POS", alias = "Group", default, deserialize_with = "lenient_string")]
    pub(crate) pos: String,
    #[serde(rename = "Chinese_1", deserialize_with = "lenient_string")]
    pub(crate) chinese_1: String,
    #[serde(rename = "Chinese_2", default, deserialize_with = "lenient_string")]
    pub(crate) chinese_2: String,
    #[serde(rename = "Example", default, deserialize_with = "lenient_string")]
    pub(crate) example: String,
    #[serde(rename = "Course", default = "default_course", deserialize_with = "course_string")]
    pub(crate) course: String,
    #[serde(rename = "Date", default = "default_date", deserialize_with = "date_string")]
    pub(crate) date: String,
    #[serde(rename = "Correct", default, deserialize_with = "lenient_count")]
    pub(crate) correct: u32,
    #[serde(rename = "Total", default, deserialize_with = "lenient_count")]
    pub(crate) total: u32,
}

impl VocabularyItem {
    /// Builds an unpracticed item with sentinel course and date.
    pub(crate) fn new(english: impl Into<String>, chinese_1: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            english: english.into(),
            pos: String::new(),
            chinese_1: chinese_1.into(),
            chinese_2: String::new(),
            example: String::new(),
            course: default_course(),
            date: default_date(),
            correct: 0,
            total: 0,
        }
    }

    /// A stored `Correct` above `Total` is clamped.
    pub(crate) fn from_document(collection: &str, document: &Document) -> Result<Self, StoreError> {
        let mut fields = document.fields.clone();
        if fields.contains_key("POS") {
            fields.remove("Group");
        }
        let normalized = Document { id: document.id.clone(), fields };
        let mut item: Self = decode(collection, &normalized)?;
        item.id = document.id.clone();
        item.correct = item.correct.min(item.total);
        Ok(item)
    }

    pub(crate) fn to_writes(&self) -> Writes {
        let mut fields = to_fields(self);
        fields.remove("id");
        Writes::from_fields(fields)
    }

    /// Records one practice attempt.
    pub(crate) fn record_attempt(&mut self, correct: bool) {
        self.total = self.total.saturating_add(1);
        if correct {
            self.correct = self.correct.saturating_add(1);
        }
        self.correct = self.correct.min(self.total);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SentenceCatalogEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) name: String,
    #[serde(default, deserialize_with = "optional_string")]
    pub(crate) last_updated: Option<String>,
}

impl SentenceCatalogEntry {
    /// Missing `id`/`name` fall back to the document key.
    pub(crate) fn from_document(collection: &str, document: &Document) -> Result<Self, StoreError> {
        let mut entry: Self = decode(collection, document)?;
        if entry.id.is_empty() {
            entry.id = document.id.clone();
        }
        if entry.name.is_empty() {
            entry.name = entry.id.clone();
        }
        Ok(entry)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SentenceItem {
    #[serde(default)]
    pub(crate) doc_id: String,
    #[serde(rename = "Category", default = "default_course", deserialize_with = "course_string")]
    pub(crate) category: String,
    #[serde(rename = "Template", deserialize_with = "lenient_string")]
    pub(crate) template: String,
    #[serde(rename = "Options", default, deserialize_with = "lenient_options")]
    pub(crate) options: Vec<String>,
    #[serde(rename = "Order", default = "default_order", deserialize_with = "lenient_order")]
    pub(crate) order: i64,
    #[serde(rename = "Timestamp", default, deserialize_with = "optional_string")]
    pub(crate) timestamp: Option<String>,
}

impl SentenceItem {
    pub(crate) fn new(
        category: impl Into<String>,
        template: impl Into<String>,
        options: Vec<String>,
        order: i64,
    ) -> Self {
        let category = category.into();
        Self {
            doc_id: String::new(),
            category: if category.trim().is_empty() { default_course() } else { category },
            template: template.into(),
            options,
            order,
            timestamp: None,
        }
    }

    pub(crate) fn from_document(collection: &str, document: &Document) -> Result<Self, StoreError> {
        let mut item: Self = decode(collection, document)?;
        item.doc_id = document.id.clone();
        Ok(item)
    }

    /// Content fields plus a server-assigned `Timestamp`.
    pub(crate) fn to_writes(&self) -> Writes {
        Writes::new()
            .put("Category", self.category.clone())
            .put("Template", self.template.clone())
            .put("Options", self.options.clone())
            .put("Order", self.order)
            .server_timestamp("Timestamp")
    }
}

/// Items in display order: `Order`, then document id.
pub(crate) fn sort_sentence_items(items: &mut [SentenceItem]) {
    items.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.doc_id.cmp(&b.doc_id)));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SentenceProgress {
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) template_hash: String,
    #[serde(default, deserialize_with = "lenient_option_set")]
    pub(crate) completed_options: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) dataset_id: String,
    #[serde(default, deserialize_with = "optional_string")]
    pub(crate) template: Option<String>,
    #[serde(default, deserialize_with = "optional_string")]
    pub(crate) last_updated: Option<String>,
}

impl SentenceProgress {
    pub(crate) fn from_document(collection: &str, document: &Document) -> Result<Self, StoreError> {
        let mut progress: Self = decode(collection, document)?;
        if progress.template_hash.is_empty() {
            progress.template_hash = document.id.clone();
        }
        Ok(progress)
    }

    /// Completed options persist as a sorted list; `last_updated` is server-assigned.
    pub(crate) fn to_writes(&self) -> Writes {
        let mut writes = Writes::new()
            .put("template_hash", self.template_hash.clone())
            .put("completed_options", self.completed_options.iter().cloned().collect::<Vec<_>>())
            .put("dataset_id", self.dataset_id.clone());
        if let Some(template) = &self.template {
            writes = writes.put("template", template.clone());
        }
        writes.server_timestamp("last_updated")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(id: &str, value: Value) -> Document {
        let Value::Object(fields) = value else { panic!("object expected") };
        Document { id: id.to_string(), fields }
    }

    #[test]
    fn vocabulary_defaults_and_clamp() {
        let doc = document(
            "v1",
            json!({"English": "apple", "Chinese_1": "蘋果", "Group": "n.", "Correct": "3", "Total": 2.0}),
        );

        let item = VocabularyItem::from_document("vocab", &doc).unwrap();

        assert_eq!(item.id, "v1");
        assert_eq!(item.pos, "n.");
        assert_eq!(item.course, UNCATEGORIZED);
        assert_eq!(item.date, NO_DATE);
        assert_eq!((item.correct, item.total), (2, 2));
    }

    #[test]
    fn vocabulary_prefers_pos_over_group() {
        let doc = document(
            "v1",
            json!({"English": "run", "Chinese_1": "跑", "POS": "v.", "Group": "n.", "Course": ""}),
        );

        let item = VocabularyItem::from_document("vocab", &doc).unwrap();

        assert_eq!(item.pos, "v.");
        assert_eq!(item.course, UNCATEGORIZED);
    }

    #[test]
    fn vocabulary_requires_english() {
        let doc = document("v1", json!({"Chinese_1": "跑"}));
        assert!(matches!(
            VocabularyItem::from_document("vocab", &doc),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn attempts_keep_correct_within_total() {
        let mut item = VocabularyItem::new("apple", "蘋果");
        item.record_attempt(true);
        item.record_attempt(false);
        assert_eq!((item.correct, item.total), (1, 2));
    }

    #[test]
    fn vocabulary_writes_omit_the_id() {
        let mut item = VocabularyItem::new("apple", "蘋果");
        item.id = "abc".to_string();
        let writes = item.to_writes();
        let op = crate::db::store::WriteOp::set("c", "abc", writes);
        let stored = crate::db::store::apply_write(None, &op, "now").unwrap().unwrap();
        assert!(!stored.contains_key("id"));
        assert_eq!(stored.get("Course"), Some(&json!(UNCATEGORIZED)));
    }

    #[test]
    fn sentence_items_accept_pipe_options_and_default_order() {
        let doc = document("s1", json!({"Template": "I like ___.", "Options": "apples | pears||"}));

        let item = SentenceItem::from_document("book", &doc).unwrap();

        assert_eq!(item.options, vec!["apples", "pears"]);
        assert_eq!(item.order, DEFAULT_ORDER);
        assert_eq!(item.category, UNCATEGORIZED);
    }

    #[test]
    fn sentence_items_sort_by_order_then_id() {
        let mut items = vec![
            SentenceItem { doc_id: "b".into(), ..SentenceItem::new("c", "t", vec![], 2) },
            SentenceItem { doc_id: "c".into(), ..SentenceItem::new("c", "t", vec![], 1) },
            SentenceItem { doc_id: "a".into(), ..SentenceItem::new("c", "t", vec![], 2) },
        ];
        sort_sentence_items(&mut items);
        let ids: Vec<&str> = items.iter().map(|item| item.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn users_default_color_and_skip_bad_stats() {
        let doc = document(
            "Neo",
            json!({
                "id": 1001,
                "password": "hash",
                "sentence_stats": {
                    "book": {"dataset_name": "Book", "total_count": 3, "completed_count": "1"},
                    "broken": "nope"
                }
            }),
        );

        let user = User::from_document("users", &doc).unwrap();

        assert_eq!(user.name, "Neo");
        assert_eq!(user.student_id, "1001");
        assert_eq!(user.color, DEFAULT_COLOR);
        assert!(!user.is_admin);
        assert_eq!(user.sentence_stats.len(), 1);
        assert_eq!(user.sentence_stats["book"].completed_count, 1);
    }

    #[test]
    fn progress_falls_back_to_document_key() {
        let doc = document("abc", json!({"completed_options": ["b", "a", "a"], "dataset_id": "book"}));

        let progress = SentenceProgress::from_document("progress", &doc).unwrap();

        assert_eq!(progress.template_hash, "abc");
        assert_eq!(progress.completed_options.len(), 2);
    }

    #[test]
    fn decode_all_skips_malformed_documents() {
        let docs = vec![
            document("ok", json!({"English": "a", "Chinese_1": "b"})),
            document("bad", json!({"English": "a"})),
        ];

        let items = decode_all("vocab", docs, VocabularyItem::from_document);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "ok");
    }
}
