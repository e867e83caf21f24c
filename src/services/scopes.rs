//! Selectable scopes over vocabulary and sentence records.
//!
//! Keys are stable strings handed to clients and sent back on later requests. Filtering
//! re-derives the scopes of the records at hand and returns them unfiltered when the key
//! is not among them, so a stale selection never fails.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::db::models::{SentenceCatalogEntry, SentenceItem, VocabularyItem};

const ALL_KEY: &str = "all";
const WHOLE_BOOK_KEY: &str = "book";

fn encode_parts(prefix: &str, parts: &[&str]) -> String {
    let encoded = serde_json::to_string(parts).unwrap_or_default();
    format!("{prefix}:{encoded}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VocabularyScope {
    All,
    Course(String),
    CourseDate(String, String),
}

impl VocabularyScope {
    pub(crate) fn key(&self) -> String {
        match self {
            Self::All => ALL_KEY.to_string(),
            Self::Course(course) => encode_parts("course", &[course.as_str()]),
            Self::CourseDate(course, date) => encode_parts("course", &[course.as_str(), date.as_str()]),
        }
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Self::All => "All words".to_string(),
            Self::Course(course) => format!("{course} (all)"),
            Self::CourseDate(course, date) => format!("{course} | {date}"),
        }
    }

    fn matches(&self, item: &VocabularyItem) -> bool {
        match self {
            Self::All => true,
            Self::Course(course) => &item.course == course,
            Self::CourseDate(course, date) => &item.course == course && &item.date == date,
        }
    }
}

/// `All`, then per course (ascending) the whole course followed by its dates (descending).
pub(crate) fn vocabulary_scopes(items: &[VocabularyItem]) -> Vec<VocabularyScope> {
    let mut courses: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for item in items {
        courses.entry(item.course.as_str()).or_default().insert(item.date.as_str());
    }

    let mut scopes = vec![VocabularyScope::All];
    for (course, dates) in courses {
        scopes.push(VocabularyScope::Course(course.to_string()));
        scopes.extend(
            dates
                .into_iter()
                .rev()
                .map(|date| VocabularyScope::CourseDate(course.to_string(), date.to_string())),
        );
    }
    scopes
}

pub(crate) fn filter_vocabulary(items: Vec<VocabularyItem>, key: &str) -> Vec<VocabularyItem> {
    let Some(scope) = vocabulary_scopes(&items).into_iter().find(|scope| scope.key() == key) else {
        return items;
    };
    items.into_iter().filter(|item| scope.matches(item)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SentenceScope {
    WholeBook,
    Category(String),
}

impl SentenceScope {
    pub(crate) fn key(&self) -> String {
        match self {
            Self::WholeBook => WHOLE_BOOK_KEY.to_string(),
            Self::Category(category) => encode_parts("category", &[category.as_str()]),
        }
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Self::WholeBook => "Whole book".to_string(),
            Self::Category(category) => category.clone(),
        }
    }

    fn matches(&self, item: &SentenceItem) -> bool {
        match self {
            Self::WholeBook => true,
            Self::Category(category) => &item.category == category,
        }
    }
}

/// `WholeBook`, then categories ascending.
pub(crate) fn sentence_scopes(items: &[SentenceItem]) -> Vec<SentenceScope> {
    let categories: BTreeSet<&str> = items.iter().map(|item| item.category.as_str()).collect();
    std::iter::once(SentenceScope::WholeBook)
        .chain(categories.into_iter().map(|category| SentenceScope::Category(category.to_string())))
        .collect()
}

pub(crate) fn filter_sentences(items: Vec<SentenceItem>, key: &str) -> Vec<SentenceItem> {
    let Some(scope) = sentence_scopes(&items).into_iter().find(|scope| scope.key() == key) else {
        return items;
    };
    items.into_iter().filter(|item| scope.matches(item)).collect()
}

/// A scope as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ScopeOption {
    pub(crate) key: String,
    pub(crate) label: String,
}

impl From<&VocabularyScope> for ScopeOption {
    fn from(scope: &VocabularyScope) -> Self {
        Self { key: scope.key(), label: scope.label() }
    }
}

impl From<&SentenceScope> for ScopeOption {
    fn from(scope: &SentenceScope) -> Self {
        Self { key: scope.key(), label: scope.label() }
    }
}

/// A book-wide or book+category scope of the admin editor. `scope` is the key to pass to
/// the book's item listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CatalogScope {
    pub(crate) key: String,
    pub(crate) label: String,
    pub(crate) dataset_id: String,
    pub(crate) scope: String,
}

/// For each book in catalog order: the whole book, then its categories ascending.
pub(crate) fn catalog_scopes(books: &[(SentenceCatalogEntry, Vec<SentenceItem>)]) -> Vec<CatalogScope> {
    let mut scopes = Vec::new();
    for (entry, items) in books {
        for scope in sentence_scopes(items) {
            let (key, label) = match &scope {
                SentenceScope::WholeBook => (encode_parts("book", &[entry.id.as_str()]), entry.name.clone()),
                SentenceScope::Category(category) => (
                    encode_parts("book", &[entry.id.as_str(), category.as_str()]),
                    format!("{} | {category}", entry.name),
                ),
            };
            scopes.push(CatalogScope { key, label, dataset_id: entry.id.clone(), scope: scope.key() });
        }
    }
    scopes
}
