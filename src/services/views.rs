//! Cached reads of data shared between students. See [`crate::core::cache`] for the
//! invalidation contract that the write paths follow.

use crate::core::cache::{CacheKey, ViewCache};
use crate::db::models::{SentenceCatalogEntry, SentenceItem};
use crate::db::paths::CollectionPaths;
use crate::db::store::{DocumentStore, StoreError};
use crate::repositories;
use crate::services::stats::UserSummary;

pub(crate) async fn users(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    cache: &ViewCache,
) -> Result<Vec<UserSummary>, StoreError> {
    if let Some(users) = cache.get(&CacheKey::Users).await {
        return Ok(users);
    }
    let users: Vec<UserSummary> =
        repositories::users::list(store, paths).await?.into_iter().map(UserSummary::from).collect();
    cache.put(&CacheKey::Users, &users).await;
    Ok(users)
}

pub(crate) async fn catalog(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    cache: &ViewCache,
) -> Result<Vec<SentenceCatalogEntry>, StoreError> {
    if let Some(entries) = cache.get(&CacheKey::Catalog).await {
        return Ok(entries);
    }
    let entries = repositories::sentences::list_catalog(store, paths).await?;
    cache.put(&CacheKey::Catalog, &entries).await;
    Ok(entries)
}

pub(crate) async fn book_items(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    cache: &ViewCache,
    dataset_id: &str,
) -> Result<Vec<SentenceItem>, StoreError> {
    let key = CacheKey::BookItems(dataset_id.to_string());
    if let Some(items) = cache.get(&key).await {
        return Ok(items);
    }
    let items = repositories::sentences::list_items(store, paths, dataset_id).await?;
    cache.put(&key, &items).await;
    Ok(items)
}

/// Called after any write to a book's catalog entry or items.
pub(crate) async fn invalidate_book(cache: &ViewCache, dataset_id: &str) {
    cache.invalidate(&CacheKey::Catalog).await;
    cache.invalidate(&CacheKey::BookItems(dataset_id.to_string())).await;
}

pub(crate) async fn invalidate_users(cache: &ViewCache) {
    cache.invalidate(&CacheKey::Users).await;
}
