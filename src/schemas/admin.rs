use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::db::models::{split_options, SentenceItem, DEFAULT_COLOR, DEFAULT_ORDER};
use crate::services::scopes::CatalogScope;
use crate::services::stats::UserSummary;

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default, alias = "studentId", alias = "id")]
    pub(crate) student_id: String,
    pub(crate) password: String,
    #[serde(default = "default_color")]
    pub(crate) color: String,
    #[serde(default, alias = "isAdmin")]
    pub(crate) is_admin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AdminUserUpdate {
    #[serde(default, alias = "studentId", alias = "id")]
    pub(crate) student_id: Option<String>,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default, alias = "isAdmin")]
    pub(crate) is_admin: Option<bool>,
}

fn options_input<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => split_options(&raw),
        Value::Array(values) => values
            .into_iter()
            .filter_map(|value| value.as_str().map(|option| option.trim().to_string()))
            .filter(|option| !option.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

/// An edited row of the book editor. Options may be a list or a pipe-delimited string.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct SentenceItemEdit {
    #[serde(default, alias = "docId")]
    pub(crate) doc_id: Option<String>,
    #[serde(rename = "Category", alias = "category", default)]
    pub(crate) category: String,
    #[serde(rename = "Template", alias = "template", default)]
    pub(crate) template: String,
    #[serde(rename = "Options", alias = "options", default, deserialize_with = "options_input")]
    pub(crate) options: Vec<String>,
    #[serde(rename = "Order", alias = "order", default)]
    pub(crate) order: Option<i64>,
}

impl SentenceItemEdit {
    pub(crate) fn into_item(self) -> SentenceItem {
        let mut item = SentenceItem::new(
            self.category.trim(),
            self.template.trim(),
            self.options,
            self.order.unwrap_or(DEFAULT_ORDER),
        );
        item.doc_id = self.doc_id.map(|id| id.trim().to_string()).unwrap_or_default();
        item
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ItemsSaveRequest {
    #[validate(length(min = 1, message = "items must not be empty"))]
    pub(crate) items: Vec<SentenceItemEdit>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ItemsDeleteRequest {
    #[serde(alias = "docIds")]
    #[validate(length(min = 1, message = "doc_ids must not be empty"))]
    pub(crate) doc_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CatalogScopesResponse {
    pub(crate) scopes: Vec<CatalogScope>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BookImportResponse {
    pub(crate) dataset_id: String,
    pub(crate) name: String,
    pub(crate) imported: usize,
    pub(crate) skipped: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct BookItemsResponse {
    pub(crate) dataset_id: String,
    pub(crate) scope: String,
    pub(crate) items: Vec<SentenceItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UsersResponse {
    pub(crate) users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ItemsSaveResponse {
    pub(crate) updated: usize,
    pub(crate) created: usize,
    pub(crate) skipped: usize,
}
