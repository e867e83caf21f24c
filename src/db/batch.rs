use thiserror::Error;

use crate::db::store::{DocumentStore, StoreError, WriteOp, MAX_BATCH_OPS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchOutcome {
    pub(crate) operations: usize,
    pub(crate) commits: usize,
}

/// A chunked mutation stopped partway. Chunks before the failure stay committed.
#[derive(Debug, Error)]
#[error("batch stopped after {committed} committed operations: {source}")]
pub(crate) struct BatchError {
    pub(crate) committed: usize,
    #[source]
    pub(crate) source: StoreError,
}

impl From<StoreError> for BatchError {
    fn from(source: StoreError) -> Self {
        Self { committed: 0, source }
    }
}

/// Commits `ops` in input order, in chunks of at most `chunk_size` (capped at
/// [`MAX_BATCH_OPS`]). There is no atomicity across chunks.
pub(crate) async fn commit_chunked(
    store: &dyn DocumentStore,
    ops: Vec<WriteOp>,
    chunk_size: usize,
) -> Result<BatchOutcome, BatchError> {
    let chunk_size = chunk_size.clamp(1, MAX_BATCH_OPS);
    let total = ops.len();
    let mut committed = 0usize;
    let mut commits = 0usize;
    let mut pending = ops.into_iter().peekable();

    while pending.peek().is_some() {
        let chunk: Vec<WriteOp> = pending.by_ref().take(chunk_size).collect();
        let len = chunk.len();
        store.commit(chunk).await.map_err(|source| {
            tracing::warn!(committed, total, "Chunked batch stopped on a failed commit");
            BatchError { committed, source }
        })?;
        committed += len;
        commits += 1;
        metrics::counter!("store_batch_commits_total").increment(1);
    }

    Ok(BatchOutcome { operations: committed, commits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDocumentStore;
    use crate::db::store::{Document, Writes};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Wraps the memory store, recording the id order of each commit.
    struct RecordingStore {
        inner: MemoryDocumentStore,
        commits: Mutex<Vec<Vec<String>>>,
        fail_on_commit: Option<usize>,
    }

    impl RecordingStore {
        fn new(fail_on_commit: Option<usize>) -> Self {
            Self { inner: MemoryDocumentStore::new(), commits: Mutex::new(Vec::new()), fail_on_commit }
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
            self.inner.list(collection).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn query_eq(
            &self,
            collection: &str,
            field: &str,
            value: &Value,
        ) -> Result<Vec<Document>, StoreError> {
            self.inner.query_eq(collection, field, value).await
        }

        async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
            let index = self.commits.lock().unwrap().len();
            if self.fail_on_commit == Some(index) {
                return Err(StoreError::InvalidPath("injected failure".to_string()));
            }
            let ids = ops.iter().map(|op| op.target().1.to_string()).collect();
            self.inner.commit(ops).await?;
            self.commits.lock().unwrap().push(ids);
            Ok(())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "recording"
        }
    }

    fn numbered_ops(count: usize) -> Vec<WriteOp> {
        (0..count)
            .map(|index| WriteOp::set("items", format!("{index:04}"), Writes::new().put("n", index)))
            .collect()
    }

    #[tokio::test]
    async fn thousand_ops_commit_as_400_400_200_in_order() {
        let store = RecordingStore::new(None);

        let outcome = commit_chunked(&store, numbered_ops(1000), MAX_BATCH_OPS).await.unwrap();

        assert_eq!(outcome, BatchOutcome { operations: 1000, commits: 3 });
        let commits = store.commits.lock().unwrap();
        let sizes: Vec<usize> = commits.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![400, 400, 200]);
        let flattened: Vec<String> = commits.iter().flatten().cloned().collect();
        let expected: Vec<String> = (0..1000).map(|index| format!("{index:04}")).collect();
        assert_eq!(flattened, expected);
    }

    #[tokio::test]
    async fn failure_keeps_earlier_chunks() {
        let store = RecordingStore::new(Some(1));

        let err = commit_chunked(&store, numbered_ops(1000), MAX_BATCH_OPS).await.unwrap_err();

        assert_eq!(err.committed, 400);
        assert_eq!(store.list("items").await.unwrap().len(), 400);
    }

    #[tokio::test]
    async fn oversized_chunk_requests_are_capped() {
        let store = RecordingStore::new(None);

        let outcome = commit_chunked(&store, numbered_ops(450), 10_000).await.unwrap();

        assert_eq!(outcome.commits, 2);
    }

    #[tokio::test]
    async fn empty_input_commits_nothing() {
        let store = RecordingStore::new(None);

        let outcome = commit_chunked(&store, Vec::new(), MAX_BATCH_OPS).await.unwrap();

        assert_eq!(outcome, BatchOutcome { operations: 0, commits: 0 });
        assert!(store.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_deletes_are_idempotent() {
        let store = RecordingStore::new(None);
        commit_chunked(&store, numbered_ops(3), MAX_BATCH_OPS).await.unwrap();
        let deletes = || (0..3).map(|index| WriteOp::delete("items", format!("{index:04}"))).collect();

        commit_chunked(&store, deletes(), MAX_BATCH_OPS).await.unwrap();
        commit_chunked(&store, deletes(), MAX_BATCH_OPS).await.unwrap();

        assert!(store.list("items").await.unwrap().is_empty());
    }
}
