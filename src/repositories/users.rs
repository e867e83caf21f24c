use serde_json::json;

use crate::db::models::{decode_all, DatasetStat, User};
use crate::db::paths::{validate_dataset_id, validate_segment, CollectionPaths};
use crate::db::store::{DocumentStore, StoreError, WriteOp, Writes};

pub(crate) async fn list(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
) -> Result<Vec<User>, StoreError> {
    let collection = paths.users();
    let documents = store.list(&collection).await?;
    Ok(decode_all(&collection, documents, User::from_document))
}

pub(crate) async fn find(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    name: &str,
) -> Result<Option<User>, StoreError> {
    validate_segment(name)?;
    let collection = paths.users();
    store
        .get(&collection, name)
        .await?
        .map(|document| User::from_document(&collection, &document))
        .transpose()
}

pub(crate) struct UpsertUser<'a> {
    pub(crate) name: &'a str,
    pub(crate) student_id: Option<&'a str>,
    pub(crate) password_hash: Option<String>,
    pub(crate) color: Option<&'a str>,
    pub(crate) is_admin: Option<bool>,
}

/// Merge-set: fields left as `None` keep their stored value.
pub(crate) async fn upsert(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    params: UpsertUser<'_>,
) -> Result<(), StoreError> {
    validate_segment(params.name)?;
    let mut writes = Writes::new().put("name", params.name);
    if let Some(student_id) = params.student_id {
        writes = writes.put("id", student_id);
    }
    if let Some(password_hash) = params.password_hash {
        writes = writes.put("password", password_hash);
    }
    if let Some(color) = params.color {
        writes = writes.put("color", color);
    }
    if let Some(is_admin) = params.is_admin {
        writes = writes.put("is_admin", is_admin);
    }
    store.write(WriteOp::merge(paths.users(), params.name, writes)).await
}

/// Fails with `NotFound` when the user does not exist.
pub(crate) async fn update_password(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    name: &str,
    password_hash: &str,
) -> Result<(), StoreError> {
    validate_segment(name)?;
    store
        .write(WriteOp::update(paths.users(), name, Writes::new().put("password", password_hash)))
        .await
}

pub(crate) async fn delete(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    name: &str,
) -> Result<(), StoreError> {
    validate_segment(name)?;
    store.write(WriteOp::delete(paths.users(), name)).await
}

/// Overwrites `sentence_stats.{dataset_id}`; `last_active` is server-assigned.
pub(crate) async fn write_dataset_stat(
    store: &dyn DocumentStore,
    paths: &CollectionPaths,
    name: &str,
    dataset_id: &str,
    stat: &DatasetStat,
) -> Result<(), StoreError> {
    validate_segment(name)?;
    validate_dataset_id(dataset_id)?;
    let prefix = format!("sentence_stats.{dataset_id}");
    let writes = Writes::new()
        .put(
            prefix.clone(),
            json!({
                "dataset_name": stat.dataset_name,
                "total_count": stat.total_count,
                "completed_count": stat.completed_count,
                "in_progress_count": stat.in_progress_count,
            }),
        )
        .server_timestamp(format!("{prefix}.last_active"));
    store.write(WriteOp::update(paths.users(), name, writes)).await
}
