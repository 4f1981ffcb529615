//! Ingestion statistics and document listing for the CLI.
//!
//! `campus stats` prints distinct-document counts per scope level;
//! `campus documents` lists every indexed document with its chunk count
//! and estimated size.

use anyhow::Result;

use campus_rag_core::models::{IngestedDocument, IngestionStats, ScopeCount};

use crate::services::Services;

pub async fn run_stats(services: &Services) -> Result<()> {
    let stats = services.assistant.stats().await?;
    let db_size = std::fs::metadata(&services.config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Campus RAG Ingestion Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", services.config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    print_stats(&stats);
    println!();
    Ok(())
}

fn print_stats(stats: &IngestionStats) {
    println!("  Documents:   {}", stats.total_documents);
    for (label, counts) in [
        ("department", &stats.by_department),
        ("program", &stats.by_program),
        ("module", &stats.by_module),
        ("activity", &stats.by_activity),
    ] {
        print_breakdown(label, counts);
    }
}

fn print_breakdown(label: &str, counts: &[ScopeCount]) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("  By {}:", label);
    println!("  {:>10} {:>8}", "ID", "DOCS");
    println!("  {}", "-".repeat(19));
    for c in counts {
        println!("  {:>10} {:>8}", c.id, c.documents);
    }
}

pub async fn run_documents(services: &Services) -> Result<()> {
    let documents = services.assistant.documents().await?;
    if documents.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }
    print_documents(&documents);
    Ok(())
}

fn print_documents(documents: &[IngestedDocument]) {
    println!(
        "{:<16} {:<28} {:<16} {:>6} {:>10}   {}",
        "HASH", "FILE", "SCOPE", "CHUNKS", "SIZE (KB)", "INGESTED"
    );
    println!("{}", "-".repeat(100));
    for d in documents {
        println!(
            "{:<16} {:<28} {:<16} {:>6} {:>10.2}   {}",
            short_hash(&d.content_hash),
            truncate(&d.base_filename, 28),
            d.scope.to_string(),
            d.chunk_count,
            d.estimated_size_kb,
            d.ingested_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub(crate) fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{}…", cut)
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_short_hash_and_truncate() {
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash(&"f".repeat(64)).len(), 16);
        assert_eq!(truncate("cours.txt", 28), "cours.txt");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
