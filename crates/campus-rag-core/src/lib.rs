//! # campus-rag core
//!
//! Runtime-independent logic for the campus retrieval assistant: the scope
//! model, content hashing, normalization, chunking, store traits,
//! similarity thresholding, prompt templates and quiz parsing.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete backends live in the `campus-rag` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod quiz;
pub mod retrieval;
pub mod store;

pub use error::{QuizError, RagError, Result};
