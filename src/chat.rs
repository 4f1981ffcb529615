//! CLI commands over the question-answering path: `ask`, `retrieve`,
//! `history`.

use anyhow::Result;

use campus_rag_core::models::{HistoryFilter, Scope};
use campus_rag_core::retrieval::{similarity, Retrieval};

use crate::services::Services;

pub async fn run_ask(services: &Services, question: &str, scope: &Scope) -> Result<()> {
    let generation = services.assistant.answer(question, scope).await;
    println!("{}", generation.text());
    eprintln!("(answered by: {})", generation.source());
    Ok(())
}

/// Show what retrieval would feed the backend, without generating.
pub async fn run_retrieve(
    services: &Services,
    question: &str,
    scope: &Scope,
    top_k: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    let retrieval_config = &services.config.retrieval;
    let top_k = top_k.unwrap_or(retrieval_config.top_k);
    let threshold = threshold.unwrap_or(retrieval_config.similarity_threshold);
    let retriever = services.assistant.retriever();

    let hits = retriever.nearest(question, scope, top_k).await?;
    println!("{} candidate(s) in scope {}", hits.len(), scope);
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [similarity: {:.3}] {}",
            i + 1,
            similarity(hit.distance),
            hit.id
        );
    }

    match retriever.retrieve_with(question, scope, top_k, threshold).await {
        Retrieval::Context(chunks) => {
            println!();
            println!("--- Context ({} chunk(s) >= {}) ---", chunks.len(), threshold);
            for chunk in &chunks {
                println!("{}", chunk);
                println!();
            }
        }
        Retrieval::BelowThreshold => println!("All candidates below threshold {}.", threshold),
        Retrieval::NoResult => println!("No result."),
    }
    Ok(())
}

pub async fn run_history(
    services: &Services,
    profile_id: i64,
    department_id: Option<i64>,
    program_id: Option<i64>,
) -> Result<()> {
    let filter = HistoryFilter::for_profile(profile_id, department_id, program_id);
    let history = services.assistant.history(filter).await?;
    if history.is_empty() {
        println!("No chat history.");
        return Ok(());
    }
    for exchange in &history {
        println!(
            "[{}] user {} ({})",
            exchange.timestamp.format("%Y-%m-%d %H:%M"),
            exchange.scope.user_id,
            exchange.scope
        );
        println!("Q: {}", exchange.question);
        println!("A: {}", exchange.answer);
        println!();
    }
    Ok(())
}
