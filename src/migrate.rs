use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create every table and index. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Relational copy of chunk text, one row per chunk
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_metadata (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            base_filename TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            department_id INTEGER NOT NULL,
            program_id INTEGER NOT NULL,
            module_id INTEGER NOT NULL,
            activity_id INTEGER NOT NULL,
            profile_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only chat log
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            department_id INTEGER NOT NULL,
            program_id INTEGER NOT NULL,
            module_id INTEGER NOT NULL,
            activity_id INTEGER NOT NULL,
            profile_id INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Vector store: one row per chunk id, scoped by collection
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            base_filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            department_id INTEGER NOT NULL,
            program_id INTEGER NOT NULL,
            module_id INTEGER NOT NULL,
            activity_id INTEGER NOT NULL,
            profile_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Persisted dedup ledger (used when dedup.ledger = "sqlite")
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_hashes (
            content_hash TEXT PRIMARY KEY,
            processed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_metadata_hash ON document_metadata(content_hash)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_chunk_vectors_scope ON chunk_vectors(
            collection, department_id, program_id, module_id, activity_id, profile_id, user_id
        )"#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_hash ON chunk_vectors(collection, content_hash)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_history_ts ON chat_history(timestamp DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
