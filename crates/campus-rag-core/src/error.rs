//! Error taxonomy for the pipeline.
//!
//! [`RagError`] covers ingestion, storage and generation failures.
//! [`QuizError`] is the typed result of quiz generation, where a parse or
//! validation failure is an expected outcome rather than an exception.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// Unreadable or unsupported content during extraction, normalization
    /// or chunking. Fatal to the ingestion call that hit it.
    #[error("processing error: {0}")]
    Processing(String),

    /// Vector or relational store unreachable, failing, or timed out.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A generation backend failed. Raised by single backends; the failover
    /// wrapper turns exhaustion of all backends into a tagged result.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Why quiz generation produced no questions.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("no document found for the given hashes")]
    NoDocument,

    /// The model output was not parseable JSON of the expected shape.
    #[error("malformed model output: {reason}")]
    MalformedOutput {
        reason: String,
        raw: String,
        cleaned: String,
    },

    /// A question broke a structural rule (1-based `question`).
    #[error("question {question}: {rule}")]
    Validation { question: usize, rule: String },

    #[error("generation backends unavailable: {0}")]
    BackendUnavailable(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}
