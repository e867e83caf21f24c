use crate::db::batch::{commit_chunked, BatchError, BatchOutcome};
use crate::db::models::{decode_all, sort_sentence_items, SentenceCatalogEntry, SentenceItem};
use crate::db::paths::{validate_dataset_id, validate_segment, CollectionPaths};
use crate::db::store::{new_document_id, DocumentStore, StoreError, WriteOp, Writes, MAX_BATCH_OPS};

pub(crate) async fn list_catalog(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
) -> Result<Vec<SentenceCatalogEntry>, StoreError> {
    let collection = paths.sentence_catalog();
    let documents = store.list(&collection).await?;
    Ok(decode_all(&collection, documents, SentenceCatalogEntry::from_document))
}

pub(crate) async fn find_catalog_entry(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    dataset_id: &str,
) -> Result<Option<SentenceCatalogEntry>, StoreError> {
    validate_dataset_id(dataset_id)?;
    let collection = paths.sentence_catalog();
    store
        .get(&collection, dataset_id)
        .await?
        .map(|document| SentenceCatalogEntry::from_document(&collection, &document))
        .transpose()
}

/// Creates or renames a book; `last_updated` is server-assigned.
pub(crate) async fn upsert_catalog_entry(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    dataset_id: &str,
    name: &str,
) -> Result<(), StoreError> {
    validate_dataset_id(dataset_id)?;
    let writes = Writes::new().put("id", dataset_id).put("name", name).server_timestamp("last_updated");
    store.write(WriteOp::merge(paths.sentence_catalog(), dataset_id, writes)).await
}

/// Items sorted by `Order`, then document id.
pub(crate) async fn list_items(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    dataset_id: &str,
) -> Result<Vec<SentenceItem>, StoreError> {
    validate_dataset_id(dataset_id)?;
    let collection = paths.sentence_items(dataset_id);
    let documents = store.list(&collection).await?;
    let mut items = decode_all(&collection, documents, SentenceItem::from_document);
    sort_sentence_items(&mut items);
    Ok(items)
}

pub(crate) async fn find_item(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    dataset_id: &str,
    doc_id: &str,
) -> Result<Option<SentenceItem>, StoreError> {
    validate_dataset_id(dataset_id)?;
    validate_segment(doc_id)?;
    let collection = paths.sentence_items(dataset_id);
    store
        .get(&collection, doc_id)
        .await?
        .map(|document| SentenceItem::from_document(&collection, &document))
        .transpose()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SaveOutcome {
    pub(crate) updated: usize,
    pub(crate) created: usize,
    pub(crate) skipped: usize,
}

/// Items with a `doc_id` are merged into place, the rest are created under fresh ids.
/// Items with a blank template are skipped.
pub(crate) async fn save_items(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    dataset_id: &str,
    items: Vec<SentenceItem>,
) -> Result<SaveOutcome, BatchError> {
    validate_dataset_id(dataset_id)?;
    let collection = paths.sentence_items(dataset_id);
    let mut outcome = SaveOutcome::default();
    let mut ops = Vec::with_capacity(items.len());

    for item in items {
        if item.template.trim().is_empty() {
            outcome.skipped += 1;
            continue;
        }
        if item.doc_id.is_empty() {
            outcome.created += 1;
            ops.push(WriteOp::set(collection.clone(), new_document_id(), item.to_writes()));
        } else {
            validate_segment(&item.doc_id)?;
            outcome.updated += 1;
            ops.push(WriteOp::merge(collection.clone(), item.doc_id.clone(), item.to_writes()));
        }
    }

    commit_chunked(store, ops, MAX_BATCH_OPS).await?;
    Ok(outcome)
}

pub(crate) async fn delete_items(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    dataset_id: &str,
    doc_ids: &[String],
) -> Result<BatchOutcome, BatchError> {
    validate_dataset_id(dataset_id)?;
    for doc_id in doc_ids {
        validate_segment(doc_id)?;
    }
    let collection = paths.sentence_items(dataset_id);
    let ops = doc_ids.iter().map(|id| WriteOp::delete(collection.clone(), id.clone())).collect();
    commit_chunked(store, ops, MAX_BATCH_OPS).await
}
