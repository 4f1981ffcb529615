//! Document ingestion pipeline.
//!
//! Coordinates the full flow for one document: extraction → content hash →
//! dedup → normalization → chunking → embedding → vector store write +
//! metadata write.
//!
//! Dedup has two layers. The [`HashLedger`] is the fast path; the vector
//! store's own `exists` is authoritative. A ledger hit with an empty store
//! (e.g. after the store was wiped) reprocesses the document. A store hit
//! without a ledger hit replaces the stored chunks. Concurrent ingestions
//! of the same content are serialized by [`HashLocks`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use campus_rag_core::chunk::{chunk_text, ChunkParams, TextChunk};
use campus_rag_core::embedding::{normalize_l2, Embedder};
use campus_rag_core::hashing::{content_hash, HashLedger};
use campus_rag_core::models::{ChunkRecord, Scope, VectorEntry};
use campus_rag_core::normalize::Normalizer;
use campus_rag_core::store::{MetadataStore, VectorStore};
use campus_rag_core::{RagError, Result};

use crate::deadline;
use crate::extract;

/// Per-content-hash async mutexes.
#[derive(Default)]
pub struct HashLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl HashLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the mutex of `hash`. The map entry is removed when the
    /// returned guard drops, including when the waiting or holding future
    /// is cancelled.
    pub async fn acquire(&self, hash: &str) -> HashLockGuard<'_> {
        let lock = self
            .locks
            .entry(hash.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let mut guard = HashLockGuard {
            locks: self,
            hash: hash.to_string(),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    /// Drop the mutex for `hash` once nobody holds or waits on it.
    fn release(&self, hash: &str) {
        self.locks
            .remove_if(hash, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds one hash's mutex; releases the map entry on drop.
pub struct HashLockGuard<'a> {
    locks: &'a HashLocks,
    hash: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for HashLockGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        self.locks.release(&self.hash);
    }
}

/// Result of one ingestion request.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Indexed { content_hash: String, chunks: usize },
    Duplicate { content_hash: String },
    Failed { message: String },
}

/// Wire shape of an [`IngestOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestStatus {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl IngestOutcome {
    pub fn content_hash(&self) -> Option<&str> {
        match self {
            IngestOutcome::Indexed { content_hash, .. }
            | IngestOutcome::Duplicate { content_hash } => Some(content_hash),
            IngestOutcome::Failed { .. } => None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, IngestOutcome::Indexed { .. })
    }

    /// `{status, message}` for a document called `name`.
    pub fn to_status(&self, name: &str) -> IngestStatus {
        let (status, message) = match self {
            IngestOutcome::Indexed { chunks, .. } => (
                "success",
                format!("File {} indexed successfully. {} chunks added.", name, chunks),
            ),
            IngestOutcome::Duplicate { .. } => (
                "error",
                format!("File {} already processed and exists in database.", name),
            ),
            IngestOutcome::Failed { message } => ("error", message.clone()),
        };
        IngestStatus {
            status,
            message,
            content_hash: self.content_hash().map(str::to_string),
        }
    }
}

/// Result of [`Ingestor::delete_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub vectors_deleted: usize,
    pub metadata_deleted: usize,
}

pub struct Ingestor {
    ledger: Arc<dyn HashLedger>,
    locks: HashLocks,
    vectors: Arc<dyn VectorStore>,
    metadata: Arc<dyn MetadataStore>,
    embedder: Arc<dyn Embedder>,
    normalizer: Normalizer,
    chunk_params: ChunkParams,
    batch_size: usize,
    storage_timeout: Duration,
}

impl Ingestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn HashLedger>,
        vectors: Arc<dyn VectorStore>,
        metadata: Arc<dyn MetadataStore>,
        embedder: Arc<dyn Embedder>,
        normalizer: Normalizer,
        chunk_params: ChunkParams,
        batch_size: usize,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            locks: HashLocks::new(),
            vectors,
            metadata,
            embedder,
            normalizer,
            chunk_params,
            batch_size: batch_size.max(1),
            storage_timeout,
        }
    }

    /// Ingest the file at `path` under `scope`.
    ///
    /// Never returns an error: failures come back as
    /// [`IngestOutcome::Failed`] with the file path and reason.
    pub async fn ingest_file(
        &self,
        base_filename: &str,
        path: &Path,
        scope: Scope,
        force: bool,
    ) -> IngestOutcome {
        let content = match extract::read_document(path) {
            Ok(content) => content,
            Err(e) => return self.failed(path, e),
        };
        match self.ingest_content(base_filename, &content, scope, force).await {
            Ok(outcome) => outcome,
            Err(e) => self.failed(path, e),
        }
    }

    /// Ingest already-extracted text.
    pub async fn ingest_text(
        &self,
        base_filename: &str,
        content: &str,
        scope: Scope,
        force: bool,
    ) -> IngestOutcome {
        match self
            .ingest_content(base_filename, content.trim(), scope, force)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => self.failed(Path::new(base_filename), e),
        }
    }

    fn failed(&self, path: &Path, e: RagError) -> IngestOutcome {
        error!(path = %path.display(), error = %e, "ingestion failed");
        IngestOutcome::Failed {
            message: format!("Error indexing file {}: {}", path.display(), e),
        }
    }

    async fn ingest_content(
        &self,
        base_filename: &str,
        content: &str,
        scope: Scope,
        force: bool,
    ) -> Result<IngestOutcome> {
        let hash = content_hash(content);
        let _guard = self.locks.acquire(&hash).await;
        self.ingest_locked(base_filename, content, &hash, scope, force)
            .await
    }

    async fn ingest_locked(
        &self,
        base_filename: &str,
        content: &str,
        hash: &str,
        scope: Scope,
        force: bool,
    ) -> Result<IngestOutcome> {
        if force {
            self.ledger.forget(hash).await?;
        }

        let in_store = self.exists(hash).await?;
        if self.ledger.seen(hash).await? {
            if in_store {
                info!(hash, base_filename, "duplicate content, skipping");
                return Ok(IngestOutcome::Duplicate {
                    content_hash: hash.to_string(),
                });
            }
            warn!(hash, "hash seen but absent from the vector store, reprocessing");
        }

        let normalized = self.normalizer.normalize(content)?;
        let chunks = chunk_text(&normalized, self.chunk_params)?;
        if chunks.is_empty() {
            return Err(RagError::Processing(
                "no indexable text after normalization".to_string(),
            ));
        }

        let vectors = self.embed_all(&chunks).await?;

        if in_store {
            let removed = deadline::storage(
                self.storage_timeout,
                "vector delete",
                self.vectors.delete(hash),
            )
            .await?;
            info!(hash, removed, "replaced stale chunks");
        }
        deadline::storage(
            self.storage_timeout,
            "metadata delete",
            self.metadata.delete_chunks_by_hash(hash),
        )
        .await?;

        let ingested_at = Utc::now();
        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorEntry {
                chunk: ChunkRecord {
                    content_hash: hash.to_string(),
                    base_filename: base_filename.to_string(),
                    chunk_index: chunk.index,
                    text: chunk.text,
                    scope,
                    ingested_at,
                },
                vector,
            })
            .collect();

        for entry in &entries {
            deadline::storage(
                self.storage_timeout,
                "metadata insert",
                self.metadata.insert_chunk_metadata(&entry.chunk),
            )
            .await?;
        }
        deadline::storage(
            self.storage_timeout,
            "vector add",
            self.vectors.add(&entries),
        )
        .await?;

        self.ledger.mark_seen(hash).await?;

        info!(
            hash,
            base_filename,
            chunks = entries.len(),
            scope = %scope,
            "document indexed"
        );
        Ok(IngestOutcome::Indexed {
            content_hash: hash.to_string(),
            chunks: entries.len(),
        })
    }

    async fn exists(&self, hash: &str) -> Result<bool> {
        deadline::storage(
            self.storage_timeout,
            "vector exists",
            self.vectors.exists(hash),
        )
        .await
    }

    /// Embed chunk texts in batches, unit-normalizing every vector.
    async fn embed_all(&self, chunks: &[TextChunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embedder.embed(batch).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            out.extend(vectors.into_iter().map(normalize_l2));
        }
        Ok(out)
    }

    /// Remove every trace of a document: vectors, metadata rows, ledger entry.
    pub async fn delete_document(&self, hash: &str) -> Result<DeleteReport> {
        let _guard = self.locks.acquire(hash).await;
        self.delete_locked(hash).await
    }

    async fn delete_locked(&self, hash: &str) -> Result<DeleteReport> {
        let vectors_deleted = deadline::storage(
            self.storage_timeout,
            "vector delete",
            self.vectors.delete(hash),
        )
        .await?;
        let metadata_deleted = deadline::storage(
            self.storage_timeout,
            "metadata delete",
            self.metadata.delete_chunks_by_hash(hash),
        )
        .await?;
        self.ledger.forget(hash).await?;
        info!(hash, vectors_deleted, metadata_deleted, "document deleted");
        Ok(DeleteReport {
            vectors_deleted,
            metadata_deleted,
        })
    }
}

/// CLI printer for `campus ingest`.
pub fn print_outcome(name: &str, outcome: &IngestOutcome) {
    println!("ingest {}", name);
    match outcome {
        IngestOutcome::Indexed {
            content_hash,
            chunks,
        } => {
            println!("  hash: {}", content_hash);
            println!("  chunks written: {}", chunks);
            println!("ok");
        }
        IngestOutcome::Duplicate { content_hash } => {
            println!("  hash: {}", content_hash);
            println!("  already indexed (use --force to reprocess)");
        }
        IngestOutcome::Failed { message } => {
            println!("  {}", message);
        }
    }
}
