//! Scope-filtered retrieval.
//!
//! Encodes the query, asks the vector store for the `top_k` nearest chunks
//! under an exact six-field scope filter, then applies the similarity
//! threshold. Storage failures degrade to [`Retrieval::NoResult`] so the
//! caller can still answer without context.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use campus_rag_core::embedding::{normalize_l2, Embedder};
use campus_rag_core::models::{Scope, VectorHit};
use campus_rag_core::retrieval::{select_context, Retrieval};
use campus_rag_core::store::VectorStore;
use campus_rag_core::{RagError, Result};

use crate::deadline;

pub struct Retriever {
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    threshold: f32,
    storage_timeout: Duration,
}

impl Retriever {
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        threshold: f32,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            vectors,
            embedder,
            top_k,
            threshold,
            storage_timeout,
        }
    }

    /// Retrieve with the configured `top_k` and threshold.
    pub async fn retrieve(&self, query: &str, scope: &Scope) -> Retrieval {
        self.retrieve_with(query, scope, self.top_k, self.threshold)
            .await
    }

    pub async fn retrieve_with(
        &self,
        query: &str,
        scope: &Scope,
        top_k: usize,
        threshold: f32,
    ) -> Retrieval {
        match self.nearest(query, scope, top_k).await {
            Ok(hits) => {
                debug!(
                    scope = %scope,
                    candidates = hits.len(),
                    distances = ?hits.iter().map(|h| h.distance).collect::<Vec<_>>(),
                    "vector query"
                );
                select_context(hits, threshold)
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "retrieval failed, continuing without context");
                Retrieval::NoResult
            }
        }
    }

    /// Raw ranked hits, without thresholding.
    pub async fn nearest(&self, query: &str, scope: &Scope, top_k: usize) -> Result<Vec<VectorHit>> {
        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))?;
        let vector = normalize_l2(vector);

        deadline::storage(
            self.storage_timeout,
            "vector query",
            self.vectors.query(&vector, top_k, scope),
        )
        .await
    }
}
