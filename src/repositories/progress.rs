use serde_json::Value;

use crate::db::models::{decode_all, SentenceProgress};
use crate::db::paths::{validate_dataset_id, validate_segment, CollectionPaths};
use crate::db::store::{DocumentStore, StoreError, WriteOp};

pub(crate) async fn find(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    template_hash: &str,
) -> Result<Option<SentenceProgress>, StoreError> {
    validate_segment(user)?;
    validate_segment(template_hash)?;
    let collection = paths.sentence_progress(user);
    store
        .get(&collection, template_hash)
        .await?
        .map(|document| SentenceProgress::from_document(&collection, &document))
        .transpose()
}

/// All of a user's progress records tagged with `dataset_id`.
pub(crate) async fn list_for_dataset(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    dataset_id: &str,
) -> Result<Vec<SentenceProgress>, StoreError> {
    validate_segment(user)?;
    validate_dataset_id(dataset_id)?;
    let collection = paths.sentence_progress(user);
    let documents =
        store.query_eq(&collection, "dataset_id", &Value::String(dataset_id.to_string())).await?;
    Ok(decode_all(&collection, documents, SentenceProgress::from_document))
}

/// Persists under the template hash with a server timestamp.
pub(crate) async fn save(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    progress: &SentenceProgress,
) -> Result<(), StoreError> {
    validate_segment(user)?;
    validate_segment(&progress.template_hash)?;
    store
        .write(WriteOp::merge(
            paths.sentence_progress(user),
            progress.template_hash.clone(),
            progress.to_writes(),
        ))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDocumentStore;
    use std::collections::BTreeSet;

    fn progress(hash: &str, dataset_id: &str, options: &[&str]) -> SentenceProgress {
        SentenceProgress {
            template_hash: hash.to_string(),
            completed_options: options.iter().map(|option| option.to_string()).collect(),
            dataset_id: dataset_id.to_string(),
            template: Some(format!("template {hash}")),
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn records_are_filtered_by_dataset() {
        let store = MemoryDocumentStore::new();
        let paths = CollectionPaths::new("test-app");
        save(&store, &paths, "Neo", &progress("h1", "book", &["a"])).await.unwrap();
        save(&store, &paths, "Neo", &progress("h2", "other", &["b"])).await.unwrap();

        let records = list_for_dataset(&store, &paths, "Neo", "book").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].template_hash, "h1");
        assert!(records[0].last_updated.is_some());
    }

    #[tokio::test]
    async fn completed_options_persist_sorted() {
        let store = MemoryDocumentStore::new();
        let paths = CollectionPaths::new("test-app");
        save(&store, &paths, "Neo", &progress("h1", "book", &["c", "a"])).await.unwrap();

        let raw = store.get(&paths.sentence_progress("Neo"), "h1").await.unwrap().unwrap();
        assert_eq!(raw.fields["completed_options"], serde_json::json!(["a", "c"]));

        let loaded = find(&store, &paths, "Neo", "h1").await.unwrap().unwrap();
        let expected: BTreeSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(loaded.completed_options, expected);
    }
}
