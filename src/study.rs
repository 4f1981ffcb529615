//! CLI commands over stored documents: `summarize`, `quiz`.

use anyhow::{bail, Result};

use campus_rag_core::models::{BloomLevel, DetailLevel};

use crate::assistant::Summary;
use crate::services::Services;

pub async fn run_summarize(services: &Services, hashes: &[String], level: DetailLevel) -> Result<()> {
    match services.assistant.summarize(hashes, level).await {
        Summary::Failed(message) => bail!(message),
        summary => println!("{}", summary.text()),
    }
    Ok(())
}

pub async fn run_quiz(
    services: &Services,
    hashes: &[String],
    count: usize,
    bloom: Option<BloomLevel>,
    json: bool,
) -> Result<()> {
    let questions = services
        .assistant
        .generate_quiz(hashes, count, bloom)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&questions)?);
        return Ok(());
    }

    for (i, q) in questions.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, q.question, q.bloom_level);
        for (j, option) in q.options.iter().enumerate() {
            let marker = if j == q.correct_answer as usize { "*" } else { " " };
            println!("   {} {}) {}", marker, (b'A' + j as u8) as char, option);
        }
        println!();
    }
    Ok(())
}
