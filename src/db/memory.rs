use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::time::now_rfc3339;
use crate::db::store::{
    apply_write, check_batch_len, Document, DocumentStore, Fields, StoreError, WriteOp,
};

type Collection = BTreeMap<String, Fields>;

/// Process-local store for development and tests. Nothing survives a restart.
#[derive(Default)]
pub(crate) struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

fn to_documents<'a>(entries: impl Iterator<Item = (&'a String, &'a Fields)>) -> Vec<Document> {
    entries.map(|(id, fields)| Document { id: id.clone(), fields: fields.clone() }).collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard.get(collection).map(|docs| to_documents(docs.iter())).unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document { id: id.to_string(), fields: fields.clone() }))
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .map(|docs| {
                to_documents(docs.iter().filter(|(_, fields)| fields.get(field) == Some(value)))
            })
            .unwrap_or_default())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        check_batch_len(ops.len())?;
        let now = now_rfc3339();
        let mut guard = self.collections.write().await;

        // Stage every result first so a failing op leaves the store untouched.
        let mut staged: HashMap<(String, String), Option<Fields>> = HashMap::new();
        for op in &ops {
            let (collection, id) = op.target();
            let key = (collection.to_string(), id.to_string());
            let current = match staged.get(&key) {
                Some(state) => state.clone(),
                None => guard.get(collection).and_then(|docs| docs.get(id)).cloned(),
            };
            let next = apply_write(current, op, &now)?;
            staged.insert(key, next);
        }

        for ((collection, id), state) in staged {
            match state {
                Some(fields) => {
                    guard.entry(collection).or_default().insert(id, fields);
                }
                None => {
                    if let Some(docs) = guard.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
