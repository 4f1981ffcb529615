//! Stored document lookup by content hash (`campus info`).

use anyhow::{bail, Result};

use crate::services::Services;

pub async fn run_info(services: &Services, hash: &str) -> Result<()> {
    let Some(info) = services.assistant.document_info(hash).await? else {
        bail!("document not found: {}", hash);
    };

    println!("--- Document ---");
    println!("hash:         {}", info.content_hash);
    println!("file:         {}", info.base_filename);
    println!("scope:        {}", info.scope);
    println!("chunks:       {}", info.chunk_count);
    println!(
        "ingested_at:  {}",
        info.ingested_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    Ok(())
}
