//! Document store contract shared by the PostgreSQL and in-memory backends.
//!
//! Collections are addressed by slash-separated paths (see [`crate::db::paths`]); each
//! document is a JSON object keyed by a string id.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub(crate) type Fields = Map<String, Value>;

/// Largest number of operations a single [`DocumentStore::commit`] accepts.
pub(crate) const MAX_BATCH_OPS: usize = 400;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("batch of {len} operations exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },
    #[error("document {collection}/{id} is malformed: {reason}")]
    Malformed { collection: String, id: String, reason: String },
    #[error("invalid path segment: {0:?}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Document {
    pub(crate) id: String,
    pub(crate) fields: Fields,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Value(Value),
    /// Replaced by the commit time.
    ServerTimestamp,
    /// Removes the field.
    Delete,
}

/// Ordered field writes. Keys of an `Update` may be dotted paths into nested maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Writes(Vec<(String, FieldValue)>);

impl Writes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fields(fields: Fields) -> Self {
        Self(fields.into_iter().map(|(key, value)| (key, FieldValue::Value(value))).collect())
    }

    pub(crate) fn put(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((key.into(), FieldValue::Value(value.into())));
        self
    }

    pub(crate) fn server_timestamp(mut self, key: impl Into<String>) -> Self {
        self.0.push((key.into(), FieldValue::ServerTimestamp));
        self
    }

    pub(crate) fn delete(mut self, key: impl Into<String>) -> Self {
        self.0.push((key.into(), FieldValue::Delete));
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WriteOp {
    Set { collection: String, id: String, writes: Writes, merge: bool },
    Update { collection: String, id: String, writes: Writes },
    Delete { collection: String, id: String },
}

impl WriteOp {
    pub(crate) fn set(collection: impl Into<String>, id: impl Into<String>, writes: Writes) -> Self {
        Self::Set { collection: collection.into(), id: id.into(), writes, merge: false }
    }

    pub(crate) fn merge(
        collection: impl Into<String>,
        id: impl Into<String>,
        writes: Writes,
    ) -> Self {
        Self::Set { collection: collection.into(), id: id.into(), writes, merge: true }
    }

    pub(crate) fn update(
        collection: impl Into<String>,
        id: impl Into<String>,
        writes: Writes,
    ) -> Self {
        Self::Update { collection: collection.into(), id: id.into(), writes }
    }

    pub(crate) fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Delete { collection: collection.into(), id: id.into() }
    }

    pub(crate) fn target(&self) -> (&str, &str) {
        match self {
            Self::Set { collection, id, .. }
            | Self::Update { collection, id, .. }
            | Self::Delete { collection, id } => (collection, id),
        }
    }
}

#[async_trait]
pub(crate) trait DocumentStore: Send + Sync {
    /// All documents of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents whose top-level `field` equals `value`, ordered by id.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Applies all operations atomically, in order. Rejects more than [`MAX_BATCH_OPS`].
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;

    async fn write(&self, op: WriteOp) -> Result<(), StoreError> {
        self.commit(vec![op]).await
    }
}

pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn check_batch_len(len: usize) -> Result<(), StoreError> {
    if len > MAX_BATCH_OPS {
        return Err(StoreError::BatchTooLarge { len, max: MAX_BATCH_OPS });
    }
    Ok(())
}

/// Computes the state of one document after `op`. `None` means the document does not exist.
pub(crate) fn apply_write(
    existing: Option<Fields>,
    op: &WriteOp,
    now: &str,
) -> Result<Option<Fields>, StoreError> {
    match op {
        WriteOp::Set { writes, merge, .. } => {
            let mut fields = if *merge { existing.unwrap_or_default() } else { Fields::new() };
            for (key, value) in &writes.0 {
                match resolve(value, now) {
                    Some(Value::Object(incoming)) if *merge => match fields.get_mut(key) {
                        Some(Value::Object(current)) => deep_merge(current, incoming),
                        _ => {
                            fields.insert(key.clone(), Value::Object(incoming));
                        }
                    },
                    Some(resolved) => {
                        fields.insert(key.clone(), resolved);
                    }
                    None => {
                        fields.remove(key);
                    }
                }
            }
            Ok(Some(fields))
        }
        WriteOp::Update { collection, id, writes } => {
            let Some(mut fields) = existing else {
                return Err(StoreError::NotFound { collection: collection.clone(), id: id.clone() });
            };
            for (path, value) in &writes.0 {
                let segments: Vec<&str> = path.split('.').collect();
                match resolve(value, now) {
                    Some(resolved) => set_path(&mut fields, &segments, resolved),
                    None => remove_path(&mut fields, &segments),
                }
            }
            Ok(Some(fields))
        }
        WriteOp::Delete { .. } => Ok(None),
    }
}

fn resolve(value: &FieldValue, now: &str) -> Option<Value> {
    match value {
        FieldValue::Value(value) => Some(value.clone()),
        FieldValue::ServerTimestamp => Some(Value::String(now.to_string())),
        FieldValue::Delete => None,
    }
}

fn deep_merge(target: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(current)), Value::Object(nested)) => deep_merge(current, nested),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

fn set_path(fields: &mut Fields, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = fields;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Fields::new()));
        if !entry.is_object() {
            *entry = Value::Object(Fields::new());
        }
        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(last.to_string(), value);
}

fn remove_path(fields: &mut Fields, segments: &[&str]) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = fields;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(Value::Object(map)) => current = map,
            _ => return,
        }
    }
    current.remove(*last);
}
