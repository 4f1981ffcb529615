//! The generation orchestrator: answers, summaries and quizzes.
//!
//! [`Assistant`] composes retrieval, prompt templates and the failover
//! generator. It never returns transport-breaking errors for the three
//! generation operations: answers are always a [`Generation`], summaries a
//! [`Summary`], quizzes a typed `Result<_, QuizError>`. It also exposes the
//! read-only reporting views over the stores (documents, statistics, chat
//! history, document info).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use campus_rag_core::models::{
    BloomLevel, ChatExchange, DetailLevel, DocumentInfo, HistoryFilter, IngestedDocument,
    IngestionStats, QuizQuestion, Scope,
};
use campus_rag_core::prompt::Prompts;
use campus_rag_core::quiz::parse_quiz_response;
use campus_rag_core::retrieval::Retrieval;
use campus_rag_core::store::{MetadataStore, VectorStore};
use campus_rag_core::{QuizError, Result};

use crate::backend::{FailoverGenerator, Generation};
use crate::deadline;
use crate::retrieve::Retriever;

/// Outcome of [`Assistant::summarize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "summary", rename_all = "snake_case")]
pub enum Summary {
    Text(String),
    /// None of the hashes resolved to a stored chunk. Carries the sentinel.
    NoDocument(String),
    /// Backends unavailable, store unreadable, or empty output.
    Failed(String),
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Text(t) | Summary::NoDocument(t) | Summary::Failed(t) => t,
        }
    }
}

pub struct Assistant {
    retriever: Retriever,
    generator: FailoverGenerator,
    prompts: Prompts,
    vectors: Arc<dyn VectorStore>,
    metadata: Arc<dyn MetadataStore>,
    storage_timeout: Duration,
}

impl Assistant {
    pub fn new(
        retriever: Retriever,
        generator: FailoverGenerator,
        prompts: Prompts,
        vectors: Arc<dyn VectorStore>,
        metadata: Arc<dyn MetadataStore>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            generator,
            prompts,
            vectors,
            metadata,
            storage_timeout,
        }
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query` from the documents visible to `scope`.
    ///
    /// The exchange is appended to the chat log whatever the outcome; a
    /// failure to log is reported and otherwise ignored.
    pub async fn answer(&self, query: &str, scope: &Scope) -> Generation {
        info!(scope = %scope, "answering query");
        let retrieval = self.retriever.retrieve(query, scope).await;
        match &retrieval {
            Retrieval::Context(chunks) => debug!(chunks = chunks.len(), "context retrieved"),
            Retrieval::BelowThreshold => debug!("all candidates below similarity threshold"),
            Retrieval::NoResult => debug!("no candidate in scope"),
        }

        let prompt = self.prompts.answer(retrieval.chunks(), query);
        debug!(prompt = %prompt, "answer prompt");
        let generation = self.generator.generate(&prompt).await;

        let exchange = ChatExchange {
            question: query.to_string(),
            answer: generation.text(),
            scope: *scope,
            timestamp: Utc::now(),
        };
        if let Err(e) = deadline::storage(
            self.storage_timeout,
            "chat log append",
            self.metadata.append_chat_exchange(&exchange),
        )
        .await
        {
            warn!(error = %e, "failed to record chat exchange");
        }

        generation
    }

    /// Chunk texts of every hash, in the order given, each in index order.
    async fn full_text(&self, content_hashes: &[String]) -> Result<Option<String>> {
        let mut texts = Vec::new();
        for hash in content_hashes {
            let chunks = deadline::storage(
                self.storage_timeout,
                "chunks by hash",
                self.vectors.chunks_for_hash(hash),
            )
            .await?;
            info!(hash = %hash, chunks = chunks.len(), "loaded document chunks");
            texts.extend(chunks.into_iter().map(|c| c.text));
        }
        if texts.is_empty() {
            return Ok(None);
        }
        Ok(Some(texts.join("\n")))
    }

    pub async fn summarize(&self, content_hashes: &[String], level: DetailLevel) -> Summary {
        let full_text = match self.full_text(content_hashes).await {
            Ok(Some(text)) => text,
            Ok(None) => return Summary::NoDocument(self.prompts.no_document().to_string()),
            Err(e) => {
                warn!(error = %e, "cannot load documents for summary");
                return Summary::Failed(format!("{}: {}", self.prompts.summary_error(), e));
            }
        };

        let prompt = self.prompts.summary(&full_text, level);
        match self.generator.generate(&prompt).await {
            generation @ Generation::Unavailable(_) => Summary::Failed(generation.text()),
            generation => {
                let text = generation.text();
                if text.trim().is_empty() {
                    warn!("backend returned an empty summary");
                    Summary::Failed(self.prompts.summary_error().to_string())
                } else {
                    Summary::Text(text)
                }
            }
        }
    }

    pub async fn generate_quiz(
        &self,
        content_hashes: &[String],
        num_questions: usize,
        bloom: Option<BloomLevel>,
    ) -> std::result::Result<Vec<QuizQuestion>, QuizError> {
        let full_text = match self.full_text(content_hashes).await {
            Ok(Some(text)) => text,
            Ok(None) => return Err(QuizError::NoDocument),
            Err(e) => return Err(QuizError::StorageUnavailable(e.to_string())),
        };

        let prompt = self.prompts.quiz(&full_text, num_questions, bloom);
        let raw = match self.generator.generate(&prompt).await {
            Generation::Unavailable(reason) => return Err(QuizError::BackendUnavailable(reason)),
            generation => generation.text(),
        };
        debug!(raw = %raw, "raw quiz response");

        let questions = parse_quiz_response(&raw, num_questions).map_err(|e| {
            warn!(error = %e, "quiz response rejected");
            e
        })?;
        if questions.len() != num_questions {
            warn!(
                requested = num_questions,
                returned = questions.len(),
                "quiz question count mismatch"
            );
        }
        Ok(questions)
    }

    pub async fn documents(&self) -> Result<Vec<IngestedDocument>> {
        deadline::storage(
            self.storage_timeout,
            "list documents",
            self.metadata.list_documents(),
        )
        .await
    }

    pub async fn stats(&self) -> Result<IngestionStats> {
        deadline::storage(
            self.storage_timeout,
            "ingestion stats",
            self.metadata.ingestion_stats(),
        )
        .await
    }

    /// Chat log visible to a reader, newest first.
    pub async fn history(&self, filter: HistoryFilter) -> Result<Vec<ChatExchange>> {
        deadline::storage(
            self.storage_timeout,
            "chat history",
            self.metadata.chat_history(filter),
        )
        .await
    }

    pub async fn document_info(&self, content_hash: &str) -> Result<Option<DocumentInfo>> {
        deadline::storage(
            self.storage_timeout,
            "document info",
            self.vectors.document_info(content_hash),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationBackend;
    use async_trait::async_trait;
    use campus_rag_core::embedding::HashingEmbedder;
    use campus_rag_core::models::{ChunkRecord, VectorEntry};
    use campus_rag_core::store::memory::{InMemoryMetadataStore, InMemoryVectorStore};
    use campus_rag_core::RagError;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl GenerationBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| RagError::BackendUnavailable("down".into()))
        }
    }

    fn assistant(
        reply: Option<&'static str>,
    ) -> (Assistant, Arc<InMemoryVectorStore>, Arc<InMemoryMetadataStore>) {
        let vectors = Arc::new(InMemoryVectorStore::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let timeout = Duration::from_secs(5);
        let retriever = Retriever::new(
            vectors.clone(),
            Arc::new(HashingEmbedder::new(32)),
            3,
            0.45,
            timeout,
        );
        let generator =
            FailoverGenerator::new(Arc::new(Fixed(reply)), Arc::new(Fixed(None)), timeout);
        let assistant = Assistant::new(
            retriever,
            generator,
            Prompts::default(),
            vectors.clone(),
            metadata.clone(),
            timeout,
        );
        (assistant, vectors, metadata)
    }

    async fn store_chunk(vectors: &InMemoryVectorStore, hash: &str, index: i64, text: &str) {
        vectors
            .add(&[VectorEntry {
                chunk: ChunkRecord {
                    content_hash: hash.to_string(),
                    base_filename: "cours.txt".to_string(),
                    chunk_index: index,
                    text: text.to_string(),
                    scope: Scope::new(1, 1, 1, 1, 1, 1),
                    ingested_at: Utc::now(),
                },
                vector: vec![1.0; 32],
            }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_answer_logged_even_when_backends_fail() {
        let (assistant, _, metadata) = assistant(None);
        let scope = Scope::new(1, 2, 3, 4, 1, 9);
        let out = assistant.answer("Qu'est-ce qu'un protocole ?", &scope).await;
        assert!(!out.is_available());

        let log = metadata.chat_history(HistoryFilter::All).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].answer.starts_with("Error: "));
        assert_eq!(log[0].scope, scope);
    }

    #[tokio::test]
    async fn test_summary_without_document_is_sentinel() {
        let (assistant, _, _) = assistant(Some("résumé"));
        let summary = assistant
            .summarize(&["absent".to_string()], DetailLevel::Simplified)
            .await;
        assert_eq!(
            summary,
            Summary::NoDocument("Aucun document trouvé pour ce hash.".to_string())
        );
    }

    #[tokio::test]
    async fn test_summary_empty_output_is_error_text() {
        let (assistant, vectors, _) = assistant(Some("   "));
        store_chunk(&vectors, "h1", 0, "contenu").await;
        let summary = assistant
            .summarize(&["h1".to_string()], DetailLevel::Detailed)
            .await;
        assert_eq!(
            summary,
            Summary::Failed("Erreur lors de la génération du résumé.".to_string())
        );
    }

    #[tokio::test]
    async fn test_full_text_orders_chunks_across_hashes() {
        let (assistant, vectors, _) = assistant(Some("ok"));
        store_chunk(&vectors, "b", 1, "b1").await;
        store_chunk(&vectors, "a", 0, "a0").await;
        store_chunk(&vectors, "b", 0, "b0").await;
        let text = assistant
            .full_text(&["b".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("b0\nb1\na0"));
    }

    #[tokio::test]
    async fn test_quiz_no_document() {
        let (assistant, _, _) = assistant(Some("[]"));
        let err = assistant
            .generate_quiz(&["absent".to_string()], 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::NoDocument));
    }

    #[tokio::test]
    async fn test_quiz_count_mismatch_is_not_an_error() {
        let reply = r#"{"questions": [{"question": "Que signifie TCP ?", "options": ["Transmission Control Protocol", "Total Cable Path", "Token Control Port", "Trivial Copy Program"], "correct_answer": 0, "bloom_level": "knowledge"}]}"#;
        let (assistant, vectors, _) = assistant(Some(reply));
        store_chunk(&vectors, "h1", 0, "tcp transmission control protocol").await;
        let questions = assistant
            .generate_quiz(&["h1".to_string()], 3, Some(BloomLevel::Knowledge))
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[tokio::test]
    async fn test_quiz_backends_unavailable() {
        let (assistant, vectors, _) = assistant(None);
        store_chunk(&vectors, "h1", 0, "contenu").await;
        let err = assistant
            .generate_quiz(&["h1".to_string()], 2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::BackendUnavailable(_)));
    }
}
