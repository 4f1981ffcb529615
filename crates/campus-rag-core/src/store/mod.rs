//! Storage abstraction.
//!
//! Two stores take part in every ingestion, without a shared transaction:
//!
//! - [`VectorStore`] owns chunk vectors and is what retrieval queries.
//! - [`MetadataStore`] keeps a denormalized copy of chunk text for
//!   reporting, plus the append-only chat log.
//!
//! Consistency between them is eventual. Re-ingesting a document with the
//! same content hash rewrites the same deterministic ids and heals any
//! partial write.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ChatExchange, ChunkRecord, DocumentInfo, HistoryFilter, IngestedDocument, IngestionStats,
    Scope, VectorEntry, VectorHit,
};

/// Scoped vector storage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](VectorStore::exists) | Any chunk stored under a content hash? |
/// | [`delete`](VectorStore::delete) | Remove every chunk of a content hash |
/// | [`add`](VectorStore::add) | Write entries; same id overwrites |
/// | [`query`](VectorStore::query) | Nearest neighbours under an exact scope |
/// | [`chunks_for_hash`](VectorStore::chunks_for_hash) | Full retrieval by hash |
/// | [`document_info`](VectorStore::document_info) | Debug lookup by hash |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn exists(&self, content_hash: &str) -> Result<bool>;

    /// Returns the number of chunks removed.
    async fn delete(&self, content_hash: &str) -> Result<usize>;

    /// Side-effect only: performs no existence check. Callers check
    /// [`exists`](VectorStore::exists) and [`delete`](VectorStore::delete)
    /// stale entries first.
    async fn add(&self, entries: &[VectorEntry]) -> Result<()>;

    /// Up to `top_k` chunks whose scope equals `scope` on all six fields,
    /// in ascending cosine distance. No threshold is applied here.
    async fn query(&self, vector: &[f32], top_k: usize, scope: &Scope) -> Result<Vec<VectorHit>>;

    /// Every chunk of a content hash, ordered by chunk index.
    async fn chunks_for_hash(&self, content_hash: &str) -> Result<Vec<ChunkRecord>>;

    async fn document_info(&self, content_hash: &str) -> Result<Option<DocumentInfo>>;
}

/// Relational side: chunk metadata rows and the chat log.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_chunk_metadata(&self, chunk: &ChunkRecord) -> Result<()>;

    async fn fetch_chunks_for_scope(&self, scope: &Scope) -> Result<Vec<ChunkRecord>>;

    /// Returns the number of rows removed.
    async fn delete_chunks_by_hash(&self, content_hash: &str) -> Result<usize>;

    /// Append one exchange. Rows are never updated or deleted.
    async fn append_chat_exchange(&self, exchange: &ChatExchange) -> Result<()>;

    async fn list_documents(&self) -> Result<Vec<IngestedDocument>>;

    async fn ingestion_stats(&self) -> Result<IngestionStats>;

    /// Exchanges visible under `filter`, newest first.
    async fn chat_history(&self, filter: HistoryFilter) -> Result<Vec<ChatExchange>>;
}

/// Group chunk rows into per-document listing rows, keeping first-seen order.
pub fn summarize_documents(rows: &[ChunkRecord]) -> Vec<IngestedDocument> {
    let mut docs: Vec<IngestedDocument> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    for row in rows {
        let pos = match docs.iter().position(|d| d.content_hash == row.content_hash) {
            Some(p) => p,
            None => {
                docs.push(IngestedDocument {
                    content_hash: row.content_hash.clone(),
                    base_filename: row.base_filename.clone(),
                    scope: row.scope,
                    ingested_at: row.ingested_at,
                    chunk_count: 0,
                    estimated_size_kb: 0.0,
                });
                sizes.push(0);
                docs.len() - 1
            }
        };
        docs[pos].chunk_count += 1;
        sizes[pos] += row.text.chars().count();
    }
    for (doc, size) in docs.iter_mut().zip(sizes) {
        doc.estimated_size_kb = (size as f64 / 1024.0 * 100.0).round() / 100.0;
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(hash: &str, index: i64, text: &str) -> ChunkRecord {
        ChunkRecord {
            content_hash: hash.to_string(),
            base_filename: format!("{}.txt", hash),
            chunk_index: index,
            text: text.to_string(),
            scope: Scope::new(1, 1, 1, 1, 1, 1),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn test_summarize_documents_groups_by_hash() {
        let rows = vec![
            row("a", 0, &"x".repeat(1024)),
            row("b", 0, "y"),
            row("a", 1, &"x".repeat(512)),
        ];
        let docs = summarize_documents(&rows);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content_hash, "a");
        assert_eq!(docs[0].chunk_count, 2);
        assert_eq!(docs[0].estimated_size_kb, 1.5);
        assert_eq!(docs[1].chunk_count, 1);
    }
}
