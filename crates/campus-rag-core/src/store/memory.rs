//! In-memory store implementations for tests and ephemeral runs.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Vector search is brute-force
//! cosine distance over every stored vector in scope.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{RagError, Result};
use crate::models::{
    ChatExchange, ChunkRecord, DocumentInfo, HistoryFilter, IngestedDocument, IngestionStats,
    Scope, ScopeCount, VectorEntry, VectorHit,
};

use super::{summarize_documents, MetadataStore, VectorStore};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| RagError::StorageUnavailable("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| RagError::StorageUnavailable("in-memory store lock poisoned".to_string()))
}

/// In-memory [`VectorStore`].
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vectors across all documents.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn exists(&self, content_hash: &str) -> Result<bool> {
        Ok(read(&self.entries)?
            .iter()
            .any(|e| e.chunk.content_hash == content_hash))
    }

    async fn delete(&self, content_hash: &str) -> Result<usize> {
        let mut entries = write(&self.entries)?;
        let before = entries.len();
        entries.retain(|e| e.chunk.content_hash != content_hash);
        Ok(before - entries.len())
    }

    async fn add(&self, new_entries: &[VectorEntry]) -> Result<()> {
        let mut entries = write(&self.entries)?;
        for entry in new_entries {
            let id = entry.chunk.id();
            match entries.iter_mut().find(|e| e.chunk.id() == id) {
                Some(existing) => *existing = entry.clone(),
                None => entries.push(entry.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize, scope: &Scope) -> Result<Vec<VectorHit>> {
        let entries = read(&self.entries)?;
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .filter(|e| e.chunk.scope == *scope)
            .map(|e| VectorHit {
                id: e.chunk.id(),
                text: e.chunk.text.clone(),
                distance: cosine_distance(vector, &e.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn chunks_for_hash(&self, content_hash: &str) -> Result<Vec<ChunkRecord>> {
        let mut chunks: Vec<ChunkRecord> = read(&self.entries)?
            .iter()
            .filter(|e| e.chunk.content_hash == content_hash)
            .map(|e| e.chunk.clone())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn document_info(&self, content_hash: &str) -> Result<Option<DocumentInfo>> {
        let chunks = self.chunks_for_hash(content_hash).await?;
        Ok(chunks.first().map(|first| DocumentInfo {
            content_hash: content_hash.to_string(),
            base_filename: first.base_filename.clone(),
            chunk_count: chunks.len(),
            scope: first.scope,
            ingested_at: first.ingested_at,
        }))
    }
}

/// In-memory [`MetadataStore`].
#[derive(Default)]
pub struct InMemoryMetadataStore {
    chunks: RwLock<Vec<ChunkRecord>>,
    chat: RwLock<Vec<ChatExchange>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Distinct documents per id of one scope level, ordered by id.
fn count_by(rows: &[ChunkRecord], key: impl Fn(&Scope) -> i64) -> Vec<ScopeCount> {
    let mut groups: BTreeMap<i64, HashSet<&str>> = BTreeMap::new();
    for row in rows {
        groups
            .entry(key(&row.scope))
            .or_default()
            .insert(row.content_hash.as_str());
    }
    groups
        .into_iter()
        .map(|(id, hashes)| ScopeCount {
            id,
            documents: hashes.len() as i64,
        })
        .collect()
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert_chunk_metadata(&self, chunk: &ChunkRecord) -> Result<()> {
        write(&self.chunks)?.push(chunk.clone());
        Ok(())
    }

    async fn fetch_chunks_for_scope(&self, scope: &Scope) -> Result<Vec<ChunkRecord>> {
        Ok(read(&self.chunks)?
            .iter()
            .filter(|c| c.scope == *scope)
            .cloned()
            .collect())
    }

    async fn delete_chunks_by_hash(&self, content_hash: &str) -> Result<usize> {
        let mut chunks = write(&self.chunks)?;
        let before = chunks.len();
        chunks.retain(|c| c.content_hash != content_hash);
        Ok(before - chunks.len())
    }

    async fn append_chat_exchange(&self, exchange: &ChatExchange) -> Result<()> {
        write(&self.chat)?.push(exchange.clone());
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<IngestedDocument>> {
        let mut rows = read(&self.chunks)?.clone();
        rows.sort_by(|a, b| {
            a.content_hash
                .cmp(&b.content_hash)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        Ok(summarize_documents(&rows))
    }

    async fn ingestion_stats(&self) -> Result<IngestionStats> {
        let rows = read(&self.chunks)?;
        let total: HashSet<&str> = rows.iter().map(|r| r.content_hash.as_str()).collect();
        Ok(IngestionStats {
            total_documents: total.len() as i64,
            by_department: count_by(&rows, |s| s.department_id),
            by_program: count_by(&rows, |s| s.program_id),
            by_module: count_by(&rows, |s| s.module_id),
            by_activity: count_by(&rows, |s| s.activity_id),
        })
    }

    async fn chat_history(&self, filter: HistoryFilter) -> Result<Vec<ChatExchange>> {
        let chat = read(&self.chat)?;
        let mut visible: Vec<ChatExchange> = chat
            .iter()
            .filter(|c| match filter {
                HistoryFilter::All => true,
                HistoryFilter::DepartmentProgram {
                    department_id,
                    program_id,
                } => c.scope.department_id == department_id && c.scope.program_id == program_id,
                HistoryFilter::Program { program_id } => c.scope.program_id == program_id,
                HistoryFilter::Nothing => false,
            })
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(hash: &str, index: i64, scope: Scope, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            chunk: ChunkRecord {
                content_hash: hash.to_string(),
                base_filename: "notes.txt".to_string(),
                chunk_index: index,
                text: format!("{} chunk {}", hash, index),
                scope,
                ingested_at: Utc::now(),
            },
            vector,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_within_scope() {
        let store = InMemoryVectorStore::new();
        let scope = Scope::new(1, 1, 1, 1, 1, 1);
        let other = Scope::new(1, 1, 1, 1, 1, 2);
        store
            .add(&[
                entry("h", 0, scope, vec![0.0, 1.0]),
                entry("h", 1, scope, vec![1.0, 0.0]),
                entry("h", 2, other, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 5, &scope).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "h_1");
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[1].distance - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_add_same_id_overwrites() {
        let store = InMemoryVectorStore::new();
        let scope = Scope::new(1, 1, 1, 1, 1, 1);
        store.add(&[entry("h", 0, scope, vec![1.0])]).await.unwrap();
        store.add(&[entry("h", 0, scope, vec![1.0])]).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let store = InMemoryVectorStore::new();
        let scope = Scope::new(1, 1, 1, 1, 1, 1);
        store
            .add(&[entry("h", 0, scope, vec![1.0]), entry("h", 1, scope, vec![1.0])])
            .await
            .unwrap();
        assert!(store.exists("h").await.unwrap());
        assert_eq!(store.delete("h").await.unwrap(), 2);
        assert!(!store.exists("h").await.unwrap());
        assert!(store.document_info("h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunks_for_hash_in_index_order() {
        let store = InMemoryVectorStore::new();
        let scope = Scope::new(1, 1, 1, 1, 1, 1);
        store
            .add(&[entry("h", 2, scope, vec![1.0]), entry("h", 0, scope, vec![1.0])])
            .await
            .unwrap();
        let chunks = store.chunks_for_hash("h").await.unwrap();
        let idx: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(idx, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_stats_count_distinct_documents() {
        let meta = InMemoryMetadataStore::new();
        for (hash, dept) in [("a", 1), ("a", 1), ("b", 1), ("c", 2)] {
            let e = entry(hash, 0, Scope::new(dept, 1, 1, 1, 1, 1), vec![]);
            meta.insert_chunk_metadata(&e.chunk).await.unwrap();
        }
        let stats = meta.ingestion_stats().await.unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(
            stats.by_department,
            vec![
                ScopeCount { id: 1, documents: 2 },
                ScopeCount { id: 2, documents: 1 }
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_history_filter_and_order() {
        let meta = InMemoryMetadataStore::new();
        let now = Utc::now();
        for (i, program) in [(0, 7), (1, 8), (2, 7)] {
            meta.append_chat_exchange(&ChatExchange {
                question: format!("q{}", i),
                answer: "a".to_string(),
                scope: Scope::new(1, program, 1, 1, 3, 10),
                timestamp: now + Duration::seconds(i),
            })
            .await
            .unwrap();
        }
        let student = meta
            .chat_history(HistoryFilter::Program { program_id: 7 })
            .await
            .unwrap();
        let questions: Vec<&str> = student.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q0"]);
        assert!(meta.chat_history(HistoryFilter::Nothing).await.unwrap().is_empty());
        assert_eq!(meta.chat_history(HistoryFilter::All).await.unwrap().len(), 3);
    }
}
