use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::debug;

/// Key-value document access. Every write is a full overwrite.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>>;
    async fn set_document(&self, collection: &str, key: &str, payload: Value) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let payload = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT payload
              FROM documents
             WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("get document {}/{}", collection, key))?;
        Ok(payload)
    }

    async fn set_document(&self, collection: &str, key: &str, payload: Value) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = now()
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(payload)
        .execute(&self.db)
        .await
        .with_context(|| format!("set document {}/{}", collection, key))?;
        Ok(())
    }
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let docs = self.docs.read().await;
        Ok(docs.get(&(collection.to_string(), key.to_string())).cloned())
    }

    async fn set_document(&self, collection: &str, key: &str, payload: Value) -> anyhow::Result<()> {
        debug!(collection, key, "memory store overwrite");
        self.docs
            .write()
            .await
            .insert((collection.to_string(), key.to_string()), payload);
        Ok(())
    }
}
