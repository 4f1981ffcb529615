//! Content fingerprints and the processed-hash ledger.
//!
//! A document's identity is the SHA-256 of its extracted text, before any
//! normalization. The [`HashLedger`] remembers which fingerprints this
//! process already handled. It is a soft, fast-path check: the vector
//! store's own [`exists`](crate::store::VectorStore::exists) stays the
//! authoritative one.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

/// Lowercase hex SHA-256 of `content`.
///
/// ```rust
/// use campus_rag_core::hashing::content_hash;
///
/// let h = content_hash("bonjour");
/// assert_eq!(h.len(), 64);
/// assert_eq!(h, content_hash("bonjour"));
/// ```
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Set of content hashes already processed.
///
/// Constructed once and shared by reference with the ingestion pipeline.
#[async_trait]
pub trait HashLedger: Send + Sync {
    async fn seen(&self, hash: &str) -> Result<bool>;
    async fn mark_seen(&self, hash: &str) -> Result<()>;
    /// Drop a hash so the next ingestion reprocesses it.
    async fn forget(&self, hash: &str) -> Result<()>;
}

/// Process-lifetime ledger backed by a `HashSet`.
#[derive(Default)]
pub struct InMemoryLedger {
    hashes: RwLock<HashSet<String>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> RagError {
    RagError::StorageUnavailable("hash ledger lock poisoned".to_string())
}

#[async_trait]
impl HashLedger for InMemoryLedger {
    async fn seen(&self, hash: &str) -> Result<bool> {
        Ok(self.hashes.read().map_err(|_| poisoned())?.contains(hash))
    }

    async fn mark_seen(&self, hash: &str) -> Result<()> {
        self.hashes
            .write()
            .map_err(|_| poisoned())?
            .insert(hash.to_string());
        Ok(())
    }

    async fn forget(&self, hash: &str) -> Result<()> {
        self.hashes.write().map_err(|_| poisoned())?.remove(hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_is_not_normalized() {
        assert_ne!(content_hash("Cours"), content_hash("cours"));
    }

    #[tokio::test]
    async fn test_ledger_mark_and_forget() {
        let ledger = InMemoryLedger::new();
        assert!(!ledger.seen("h1").await.unwrap());
        ledger.mark_seen("h1").await.unwrap();
        assert!(ledger.seen("h1").await.unwrap());
        ledger.forget("h1").await.unwrap();
        assert!(!ledger.seen("h1").await.unwrap());
    }
}
