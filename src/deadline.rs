//! Time limits around external calls.
//!
//! Every vector-store, metadata-store and backend call is awaited through
//! one of these wrappers. Expiry becomes the matching [`RagError`] variant
//! so callers handle a hung dependency exactly like a failing one.

use std::future::Future;
use std::time::Duration;

use campus_rag_core::{RagError, Result};

/// Await a store call, failing with `StorageUnavailable` after `limit`.
pub async fn storage<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::StorageUnavailable(format!(
            "{} timed out after {}s",
            what,
            limit.as_secs_f32()
        ))),
    }
}

/// Await a backend call, failing with `BackendUnavailable` after `limit`.
pub async fn backend<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::BackendUnavailable(format!(
            "{} timed out after {}s",
            what,
            limit.as_secs_f32()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_through_result() {
        let value = storage(Duration::from_secs(1), "exists", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_storage_expiry() {
        let err = storage(Duration::from_millis(10), "query", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RagError::StorageUnavailable(ref m) if m.contains("query")));
    }

    #[tokio::test]
    async fn test_backend_expiry() {
        let err = backend(Duration::from_millis(10), "groq", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RagError::BackendUnavailable(_)));
    }
}
