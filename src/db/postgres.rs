use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::core::time::now_rfc3339;
use crate::db::store::{
    apply_write, check_batch_len, Document, DocumentStore, Fields, StoreError, WriteOp,
};

/// Documents live in one `documents` table keyed by (collection, id) with a JSONB body.
#[derive(Clone)]
pub(crate) struct PgDocumentStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: Json<Value>,
}

impl PgDocumentStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn into_document(collection: &str, row: DocumentRow) -> Result<Document, StoreError> {
        match row.data.0 {
            Value::Object(fields) => Ok(Document { id: row.id, fields }),
            other => Err(StoreError::Malformed {
                collection: collection.to_string(),
                id: row.id,
                reason: format!("expected an object, found {other}"),
            }),
        }
    }

    fn into_documents(
        collection: &str,
        rows: Vec<DocumentRow>,
    ) -> Result<Vec<Document>, StoreError> {
        rows.into_iter().map(|row| Self::into_document(collection, row)).collect()
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data FROM documents WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Self::into_documents(collection, rows)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::into_document(collection, row)).transpose()
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data FROM documents
             WHERE collection = $1 AND data -> $2 = $3
             ORDER BY id",
        )
        .bind(collection)
        .bind(field)
        .bind(Json(value))
        .fetch_all(&self.pool)
        .await?;

        Self::into_documents(collection, rows)
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        check_batch_len(ops.len())?;
        if ops.is_empty() {
            return Ok(());
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for op in &ops {
            let (collection, id) = op.target();
            let current: Option<Json<Value>> = sqlx::query_scalar(
                "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
            )
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            let current = match current.map(|data| data.0) {
                Some(Value::Object(fields)) => Some(fields),
                Some(_) => Some(Fields::new()),
                None => None,
            };

            match apply_write(current, op, &now)? {
                Some(fields) => {
                    sqlx::query(
                        "INSERT INTO documents (collection, id, data, updated_at)
                         VALUES ($1, $2, $3, now())
                         ON CONFLICT (collection, id)
                         DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
                    )
                    .bind(collection)
                    .bind(id)
                    .bind(Json(Value::Object(fields)))
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(collection)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
