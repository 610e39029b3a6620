//! Postgres-backed `DocumentStore`: the narrow boundary the upstream
//! HTTP surface writes cleaned text through before enqueueing, and the
//! Queue Engine reads back during payload hydration.

use async_trait::async_trait;
use resume_spine_shared::PayloadRef;
use sqlx::PgPool;

use crate::cache::DocumentStore;
use crate::error::QueueResult;

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores cleaned text under a freshly minted payload-ref. Called by
    /// the Submit handler before `JobStore::enqueue`; raw payload
    /// ingestion (PDF/DOCX parsing) happens upstream of this store.
    pub async fn put_text(&self, payload_ref: &PayloadRef, cleaned_text: &str) -> QueueResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (payload_ref, cleaned_text)
            VALUES ($1, $2)
            ON CONFLICT (payload_ref) DO UPDATE SET cleaned_text = EXCLUDED.cleaned_text
            "#,
        )
        .bind(&payload_ref.0)
        .bind(cleaned_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn fetch_text(&self, payload_ref: &PayloadRef) -> Option<String> {
        sqlx::query_scalar("SELECT cleaned_text FROM documents WHERE payload_ref = $1")
            .bind(&payload_ref.0)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
    }
}
