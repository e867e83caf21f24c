//! Sentence-progress merge and the per-dataset statistics refresh that follows it.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::cache::ViewCache;
use crate::core::security::template_hash;
use crate::db::models::{DatasetStat, SentenceItem, SentenceProgress};
use crate::db::paths::CollectionPaths;
use crate::db::store::{DocumentStore, StoreError};
use crate::repositories;
use crate::services::stats::{self, SentenceStatus};
use crate::services::views;

/// `previous ∪ (confirmed ∩ options)`. Never removes a completed option.
pub(crate) fn merge_completed(
    previous: &BTreeSet<String>,
    confirmed: &[String],
    options: &[String],
) -> BTreeSet<String> {
    let mut merged = previous.clone();
    merged.extend(confirmed.iter().filter(|option| options.contains(option)).cloned());
    merged
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ProgressUpdate {
    pub(crate) template_hash: String,
    pub(crate) completed_options: BTreeSet<String>,
    pub(crate) newly_completed: Vec<String>,
    pub(crate) status: Option<SentenceStatus>,
    pub(crate) stats_refreshed: bool,
    pub(crate) dataset_stat: Option<DatasetStat>,
}

/// Merges newly confirmed options into the user's progress for `item`, persists it, then
/// refreshes the dataset rollup. A failed refresh is logged and reported, not raised.
pub(crate) async fn record_progress(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    cache: &ViewCache,
    user: &str,
    dataset_id: &str,
    item: &SentenceItem,
    confirmed: &[String],
) -> Result<ProgressUpdate, StoreError> {
    let hash = template_hash(&item.template);
    let existing = repositories::progress::find(store, paths, user, &hash).await?;

    let previous = match existing {
        Some(record) if record.template.as_deref().is_some_and(|stored| stored != item.template) => {
            tracing::warn!(
                user,
                dataset_id,
                template_hash = %hash,
                "Template hash collision; not merging options recorded for another template"
            );
            BTreeSet::new()
        }
        Some(record) => record.completed_options,
        None => BTreeSet::new(),
    };

    let merged = merge_completed(&previous, confirmed, &item.options);
    let newly_completed: Vec<String> = merged.difference(&previous).cloned().collect();
    let progress = SentenceProgress {
        template_hash: hash.clone(),
        completed_options: merged,
        dataset_id: dataset_id.to_string(),
        template: Some(item.template.clone()),
        last_updated: None,
    };
    repositories::progress::save(store, paths, user, &progress).await?;

    let dataset_stat = match refresh_dataset_stat(store, paths, user, dataset_id).await {
        Ok(stat) => Some(stat),
        Err(err) => {
            tracing::warn!(user, dataset_id, error = %err, "Dataset statistics refresh failed");
            None
        }
    };
    if dataset_stat.is_some() {
        views::invalidate_users(cache).await;
    }

    Ok(ProgressUpdate {
        template_hash: hash,
        status: stats::sentence_status(&item.options, &progress.completed_options),
        completed_options: progress.completed_options,
        newly_completed,
        stats_refreshed: dataset_stat.is_some(),
        dataset_stat,
    })
}

/// Recomputes the user's rollup for one dataset from the store and overwrites
/// `sentence_stats.{dataset_id}` on the user document.
pub(crate) async fn refresh_dataset_stat(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    user: &str,
    dataset_id: &str,
) -> Result<DatasetStat, StoreError> {
    let items = repositories::sentences::list_items(store, paths, dataset_id).await?;
    let records = repositories::progress::list_for_dataset(store, paths, user, dataset_id).await?;
    let dataset_name = repositories::sentences::find_catalog_entry(store, paths, dataset_id)
        .await?
        .map_or_else(|| dataset_id.to_string(), |entry| entry.name);

    let stat = stats::rollup(&items, &records).into_stat(dataset_name);
    repositories::users::write_dataset_stat(store, paths, user, dataset_id, &stat).await?;
    Ok(stat)
}
