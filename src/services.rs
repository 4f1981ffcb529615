//! Wiring: builds the stores, embedder, backends and pipelines from config.
//!
//! One [`Services`] value is constructed at startup and shared (via `Arc`
//! in the server) by every request. The dedup ledger and the per-hash locks
//! live inside it, so they are scoped to the process, not global.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use campus_rag_core::hashing::{HashLedger, InMemoryLedger};
use campus_rag_core::store::{MetadataStore, VectorStore};

use crate::assistant::Assistant;
use crate::backend::FailoverGenerator;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::ingest::Ingestor;
use crate::migrate;
use crate::retrieve::Retriever;
use crate::sqlite_store::{SqliteLedger, SqliteMetadataStore, SqliteVectorStore};

pub struct Services {
    pub config: Config,
    pub pool: SqlitePool,
    pub ingestor: Ingestor,
    pub assistant: Assistant,
}

impl Services {
    /// Connect, migrate, and assemble every component.
    pub async fn build(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;

        let vectors: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(
            pool.clone(),
            config.vector_store.collection.clone(),
        ));
        let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(pool.clone()));
        let ledger: Arc<dyn HashLedger> = match config.dedup.ledger.as_str() {
            "sqlite" => Arc::new(SqliteLedger::new(pool.clone())),
            _ => Arc::new(InMemoryLedger::new()),
        };
        let embedder = create_embedder(&config.embedding)?;
        let storage_timeout = config.timeouts.storage();

        info!(
            db = %config.db.path.display(),
            collection = %config.vector_store.collection,
            embedder = embedder.model_name(),
            ledger = %config.dedup.ledger,
            "services ready"
        );

        let ingestor = Ingestor::new(
            ledger,
            vectors.clone(),
            metadata.clone(),
            embedder.clone(),
            config.normalizer()?,
            config.chunking.params(),
            config.embedding.batch_size,
            storage_timeout,
        );

        let retriever = Retriever::new(
            vectors.clone(),
            embedder,
            config.retrieval.top_k,
            config.retrieval.similarity_threshold,
            storage_timeout,
        );
        let generator =
            FailoverGenerator::from_config(&config.backends, config.timeouts.backend())?;
        let assistant = Assistant::new(
            retriever,
            generator,
            config.prompts()?,
            vectors,
            metadata,
            storage_timeout,
        );

        Ok(Self {
            config: config.clone(),
            pool,
            ingestor,
            assistant,
        })
    }
}
