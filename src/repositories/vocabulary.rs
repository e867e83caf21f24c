use crate::db::batch::{commit_chunked, BatchError, BatchOutcome};
use crate::db::models::{decode_all, VocabularyItem};
use crate::db::paths::{validate_segment, CollectionPaths};
use crate::db::store::{new_document_id, DocumentStore, StoreError, WriteOp, Writes, MAX_BATCH_OPS};

pub(crate) async fn list(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
) -> Result<Vec<VocabularyItem>, StoreError> {
    validate_segment(user)?;
    let collection = paths.vocabulary(user);
    let documents = store.list(&collection).await?;
    Ok(decode_all(&collection, documents, VocabularyItem::from_document))
}

pub(crate) async fn find(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    id: &str,
) -> Result<Option<VocabularyItem>, StoreError> {
    validate_segment(user)?;
    validate_segment(id)?;
    let collection = paths.vocabulary(user);
    store
        .get(&collection, id)
        .await?
        .map(|document| VocabularyItem::from_document(&collection, &document))
        .transpose()
}

/// Creates each item under a fresh id. Returns the items with their ids assigned.
pub(crate) async fn create_many(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    items: Vec<VocabularyItem>,
) -> Result<Vec<VocabularyItem>, BatchError> {
    validate_segment(user)?;
    let collection = paths.vocabulary(user);
    let created: Vec<VocabularyItem> = items
        .into_iter()
        .map(|mut item| {
            item.id = new_document_id();
            item.correct = item.correct.min(item.total);
            item
        })
        .collect();
    let ops = created
        .iter()
        .map(|item| WriteOp::set(collection.clone(), item.id.clone(), item.to_writes()))
        .collect();
    commit_chunked(store, ops, MAX_BATCH_OPS).await?;
    Ok(created)
}

/// Partial update of an existing item. `NotFound` when the id is unknown.
pub(crate) async fn update_fields(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    id: &str,
    writes: Writes,
) -> Result<(), StoreError> {
    validate_segment(user)?;
    validate_segment(id)?;
    if writes.is_empty() {
        return Ok(());
    }
    store.write(WriteOp::update(paths.vocabulary(user), id, writes)).await
}

/// Stores the practice counters of an item whose attempt was already recorded.
pub(crate) async fn save_counts(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    item: &VocabularyItem,
) -> Result<(), StoreError> {
    validate_segment(user)?;
    validate_segment(&item.id)?;
    let writes = Writes::new().put("Correct", item.correct).put("Total", item.total);
    store.write(WriteOp::update(paths.vocabulary(user), item.id.clone(), writes)).await
}

pub(crate) async fn delete_many(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    ids: &[String],
) -> Result<BatchOutcome, BatchError> {
    validate_segment(user)?;
    for id in ids {
        validate_segment(id)?;
    }
    let collection = paths.vocabulary(user);
    let ops = ids.iter().map(|id| WriteOp::delete(collection.clone(), id.clone())).collect();
    commit_chunked(store, ops, MAX_BATCH_OPS).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDocumentStore;

    fn paths() -> CollectionPaths {
        CollectionPaths::new("test-app")
    }

    #[tokio::test]
    async fn create_list_update_delete() {
        let store = MemoryDocumentStore::new();
        let mut apple = VocabularyItem::new("apple", "蘋果");
        apple.course = "Fruit".to_string();
        let created = create_many(&store, &paths(), "Neo", vec![apple, VocabularyItem::new("pear", "梨")])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        update_fields(&store, &paths(), "Neo", &created[0].id, Writes::new().put("Example", "An apple."))
            .await
            .unwrap();
        let stored = find(&store, &paths(), "Neo", &created[0].id).await.unwrap().unwrap();
        assert_eq!(stored.example, "An apple.");
        assert_eq!(stored.course, "Fruit");

        let ids: Vec<String> = created.iter().map(|item| item.id.clone()).collect();
        let outcome = delete_many(&store, &paths(), "Neo", &ids).await.unwrap();
        assert_eq!(outcome.operations, 2);
        assert!(list(&store, &paths(), "Neo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vocabularies_are_private_per_user() {
        let store = MemoryDocumentStore::new();
        create_many(&store, &paths(), "Neo", vec![VocabularyItem::new("apple", "蘋果")]).await.unwrap();

        assert!(list(&store, &paths(), "Trinity").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counts_round_trip_through_update() {
        let store = MemoryDocumentStore::new();
        let mut item = create_many(&store, &paths(), "Neo", vec![VocabularyItem::new("apple", "蘋果")])
            .await
            .unwrap()
            .remove(0);

        item.record_attempt(true);
        save_counts(&store, &paths(), "Neo", &item).await.unwrap();

        let stored = find(&store, &paths(), "Neo", &item.id).await.unwrap().unwrap();
        assert_eq!((stored.correct, stored.total), (1, 1));
    }
}
