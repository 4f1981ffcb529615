//! # campus-rag
//!
//! A scope-aware retrieval-augmented assistant for course material.
//!
//! Documents are ingested under a six-level scope (department, program,
//! module, activity, profile, user), deduplicated by content hash, chunked
//! and embedded into a SQLite-backed vector collection. Questions are
//! answered from the chunks visible to the asker's scope through a primary
//! generation backend with a local fallback. Stored documents can also be
//! summarized or turned into multiple-choice quizzes.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │  Extract   │──▶│ Normalize+Chunk  │──▶│ SQLite vectors │
//! │ pdf/docx/… │   │ Embed (batched)  │   │ + metadata     │
//! └────────────┘   └──────────────────┘   └───────┬────────┘
//!                                                 │ scoped top-k
//!                      ┌──────────────────────────┤
//!                      ▼                          ▼
//!                ┌───────────┐             ┌─────────────┐
//!                │ Assistant │────────────▶│  Failover   │
//!                │ answer/…  │             │ Groq→Ollama │
//!                └───────────┘             └─────────────┘
//! ```
//!
//! Storage-independent logic (scope model, hashing, normalization,
//! chunking, prompts, quiz parsing, store traits) lives in
//! `campus-rag-core`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction from txt/md/json/pdf/docx |
//! | [`embedding`] | fastembed and Ollama embedders |
//! | [`ingest`] | Deduplicated ingestion and deletion |
//! | [`retrieve`] | Scoped nearest-neighbour retrieval |
//! | [`backend`] | Generation backends and failover |
//! | [`assistant`] | Answers, summaries, quizzes, reporting |
//! | [`sqlite_store`] | SQLite vector, metadata and ledger stores |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod assistant;
pub mod backend;
pub mod chat;
pub mod config;
pub mod db;
pub mod deadline;
pub mod embedding;
pub mod extract;
pub mod info;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod retrieve;
pub mod server;
pub mod services;
pub mod sqlite_store;
pub mod stats;
pub mod study;
