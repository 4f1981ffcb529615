//! SQLite-backed store implementations.
//!
//! - [`SqliteVectorStore`] keeps vectors as little-endian `f32` BLOBs in
//!   `chunk_vectors` and ranks candidates by brute-force cosine distance in
//!   Rust, after SQL has narrowed them to the exact six-field scope.
//! - [`SqliteMetadataStore`] owns `document_metadata` and `chat_history`.
//! - [`SqliteLedger`] persists processed content hashes.
//!
//! All three share one pool. Every sqlx error surfaces as
//! [`RagError::StorageUnavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use campus_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use campus_rag_core::hashing::HashLedger;
use campus_rag_core::models::{
    ChatExchange, ChunkRecord, DocumentInfo, HistoryFilter, IngestedDocument, IngestionStats,
    Scope, ScopeCount, VectorEntry, VectorHit,
};
use campus_rag_core::store::{summarize_documents, MetadataStore, VectorStore};
use campus_rag_core::{RagError, Result};

fn storage(e: sqlx::Error) -> RagError {
    RagError::StorageUnavailable(e.to_string())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn scope_from_row(row: &SqliteRow) -> Result<Scope> {
    Ok(Scope {
        department_id: row.try_get("department_id").map_err(storage)?,
        program_id: row.try_get("program_id").map_err(storage)?,
        module_id: row.try_get("module_id").map_err(storage)?,
        activity_id: row.try_get("activity_id").map_err(storage)?,
        profile_id: row.try_get("profile_id").map_err(storage)?,
        user_id: row.try_get("user_id").map_err(storage)?,
    })
}

const SCOPE_FILTER: &str = "department_id = ? AND program_id = ? AND module_id = ? \
     AND activity_id = ? AND profile_id = ? AND user_id = ?";

// ============ Vector store ============

/// Vector store over the `chunk_vectors` table, fixed to one collection.
#[derive(Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn chunk_from_row(row: &SqliteRow) -> Result<ChunkRecord> {
        Ok(ChunkRecord {
            content_hash: row.try_get("content_hash").map_err(storage)?,
            base_filename: row.try_get("base_filename").map_err(storage)?,
            chunk_index: row.try_get("chunk_index").map_err(storage)?,
            text: row.try_get("text").map_err(storage)?,
            scope: scope_from_row(row)?,
            ingested_at: from_millis(row.try_get("ingested_at").map_err(storage)?),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn exists(&self, content_hash: &str) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM chunk_vectors WHERE collection = ? AND content_hash = ?",
        )
        .bind(&self.collection)
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)
    }

    async fn delete(&self, content_hash: &str) -> Result<usize> {
        let result =
            sqlx::query("DELETE FROM chunk_vectors WHERE collection = ? AND content_hash = ?")
                .bind(&self.collection)
                .bind(content_hash)
                .execute(&self.pool)
                .await
                .map_err(storage)?;
        Ok(result.rows_affected() as usize)
    }

    async fn add(&self, entries: &[VectorEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        for entry in entries {
            let chunk = &entry.chunk;
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (
                    collection, id, content_hash, base_filename, chunk_index, text,
                    department_id, program_id, module_id, activity_id, profile_id, user_id,
                    ingested_at, dims, embedding
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    base_filename = excluded.base_filename,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    department_id = excluded.department_id,
                    program_id = excluded.program_id,
                    module_id = excluded.module_id,
                    activity_id = excluded.activity_id,
                    profile_id = excluded.profile_id,
                    user_id = excluded.user_id,
                    ingested_at = excluded.ingested_at,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(chunk.id())
            .bind(&chunk.content_hash)
            .bind(&chunk.base_filename)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.scope.department_id)
            .bind(chunk.scope.program_id)
            .bind(chunk.scope.module_id)
            .bind(chunk.scope.activity_id)
            .bind(chunk.scope.profile_id)
            .bind(chunk.scope.user_id)
            .bind(chunk.ingested_at.timestamp_millis())
            .bind(entry.vector.len() as i64)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize, scope: &Scope) -> Result<Vec<VectorHit>> {
        let rows = sqlx::query(&format!(
            "SELECT id, text, embedding FROM chunk_vectors WHERE collection = ? AND {}",
            SCOPE_FILTER
        ))
        .bind(&self.collection)
        .bind(scope.department_id)
        .bind(scope.program_id)
        .bind(scope.module_id)
        .bind(scope.activity_id)
        .bind(scope.profile_id)
        .bind(scope.user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(storage)?;
            hits.push(VectorHit {
                id: row.try_get("id").map_err(storage)?,
                text: row.try_get("text").map_err(storage)?,
                distance: cosine_distance(vector, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn chunks_for_hash(&self, content_hash: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT content_hash, base_filename, chunk_index, text,
                   department_id, program_id, module_id, activity_id, profile_id, user_id,
                   ingested_at
            FROM chunk_vectors
            WHERE collection = ? AND content_hash = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(&self.collection)
        .bind(content_hash)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(Self::chunk_from_row).collect()
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

// ============ Metadata store ============

#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn chunk_from_row(row: &SqliteRow) -> Result<ChunkRecord> {
        Ok(ChunkRecord {
            content_hash: row.try_get("content_hash").map_err(storage)?,
            base_filename: row.try_get("base_filename").map_err(storage)?,
            chunk_index: row.try_get("chunk_index").map_err(storage)?,
            text: row.try_get("chunk_text").map_err(storage)?,
            scope: scope_from_row(row)?,
            ingested_at: from_millis(row.try_get("ingested_at").map_err(storage)?),
        })
    }

    fn exchange_from_row(row: &SqliteRow) -> Result<ChatExchange> {
        Ok(ChatExchange {
            question: row.try_get("question").map_err(storage)?,
            answer: row.try_get("answer").map_err(storage)?,
            scope: scope_from_row(row)?,
            timestamp: from_millis(row.try_get("timestamp").map_err(storage)?),
        })
    }

    /// Distinct documents per value of one scope column.
    async fn count_by(&self, column: &'static str) -> Result<Vec<ScopeCount>> {
        let rows = sqlx::query(&format!(
            "SELECT {col} AS id, COUNT(DISTINCT content_hash) AS documents \
             FROM document_metadata GROUP BY {col} ORDER BY {col}",
            col = column
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                Ok(ScopeCount {
                    id: row.try_get("id").map_err(storage)?,
                    documents: row.try_get("documents").map_err(storage)?,
                })
            })
            .collect()
    }
}

const METADATA_COLUMNS: &str = "content_hash, base_filename, chunk_index, chunk_text, \
     department_id, program_id, module_id, activity_id, profile_id, user_id, ingested_at";

const CHAT_COLUMNS: &str = "question, answer, timestamp, \
     department_id, program_id, module_id, activity_id, profile_id, user_id";

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert_chunk_metadata(&self, chunk: &ChunkRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO document_metadata ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            METADATA_COLUMNS
        ))
        .bind(&chunk.content_hash)
        .bind(&chunk.base_filename)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.scope.department_id)
        .bind(chunk.scope.program_id)
        .bind(chunk.scope.module_id)
        .bind(chunk.scope.activity_id)
        .bind(chunk.scope.profile_id)
        .bind(chunk.scope.user_id)
        .bind(chunk.ingested_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn fetch_chunks_for_scope(&self, scope: &Scope) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM document_metadata WHERE {} ORDER BY content_hash, chunk_index",
            METADATA_COLUMNS, SCOPE_FILTER
        ))
        .bind(scope.department_id)
        .bind(scope.program_id)
        .bind(scope.module_id)
        .bind(scope.activity_id)
        .bind(scope.profile_id)
        .bind(scope.user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(Self::chunk_from_row).collect()
    }

    async fn delete_chunks_by_hash(&self, content_hash: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM document_metadata WHERE content_hash = ?")
            .bind(content_hash)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() as usize)
    }

    async fn append_chat_exchange(&self, exchange: &ChatExchange) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_history (
                user_id, question, answer, timestamp,
                department_id, program_id, module_id, activity_id, profile_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(exchange.scope.user_id)
        .bind(&exchange.question)
        .bind(&exchange.answer)
        .bind(exchange.timestamp.timestamp_millis())
        .bind(exchange.scope.department_id)
        .bind(exchange.scope.program_id)
        .bind(exchange.scope.module_id)
        .bind(exchange.scope.activity_id)
        .bind(exchange.scope.profile_id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<IngestedDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM document_metadata ORDER BY content_hash, chunk_index",
            METADATA_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let chunks = rows
            .iter()
            .map(Self::chunk_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(summarize_documents(&chunks))
    }

    async fn ingestion_stats(&self) -> Result<IngestionStats> {
        let total_documents: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT content_hash) FROM document_metadata")
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;

        Ok(IngestionStats {
            total_documents,
            by_department: self.count_by("department_id").await?,
            by_program: self.count_by("program_id").await?,
            by_module: self.count_by("module_id").await?,
            by_activity: self.count_by("activity_id").await?,
        })
    }

    async fn chat_history(&self, filter: HistoryFilter) -> Result<Vec<ChatExchange>> {
        let base = format!("SELECT {} FROM chat_history", CHAT_COLUMNS);
        let order = "ORDER BY timestamp DESC, id DESC";

        let rows = match filter {
            HistoryFilter::Nothing => return Ok(Vec::new()),
            HistoryFilter::All => sqlx::query(&format!("{} {}", base, order))
                .fetch_all(&self.pool)
                .await,
            HistoryFilter::DepartmentProgram {
                department_id,
                program_id,
            } => {
                sqlx::query(&format!(
                    "{} WHERE department_id = ? AND program_id = ? {}",
                    base, order
                ))
                .bind(department_id)
                .bind(program_id)
                .fetch_all(&self.pool)
                .await
            }
            HistoryFilter::Program { program_id } => {
                sqlx::query(&format!("{} WHERE program_id = ? {}", base, order))
                    .bind(program_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(storage)?;

        rows.iter().map(Self::exchange_from_row).collect()
    }
}

// ============ Dedup ledger ============

/// [`HashLedger`] persisted in `processed_hashes`.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HashLedger for SqliteLedger {
    async fn seen(&self, hash: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM processed_hashes WHERE content_hash = ?")
            .bind(hash)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    async fn mark_seen(&self, hash: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO processed_hashes (content_hash, processed_at) VALUES (?, ?) \
             ON CONFLICT(content_hash) DO NOTHING",
        )
        .bind(hash)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn forget(&self, hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM processed_hashes WHERE content_hash = ?")
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
