//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! of a stock deployment: 850/130 character chunks, top 3 hits at
//! similarity 0.45, Groq `llama3-8b-8192` first and a local Ollama
//! `gemma3:4b` second, French prompts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use campus_rag_core::chunk::{ChunkParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use campus_rag_core::normalize::{Language, Normalizer};
use campus_rag_core::prompt::Prompts;
use campus_rag_core::retrieval::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizeConfig {
    /// Stopword languages, primary first.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
        }
    }
}

fn default_languages() -> Vec<String> {
    vec!["french".to_string(), "english".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local` (fastembed), `ollama`, or `hashing`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ollama base URL (only for `provider = "ollama"`).
    #[serde(default = "default_ollama_url")]
    pub url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            url: default_ollama_url(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "paraphrase-multilingual-minilm-l12-v2".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// Collection name, fixed for the life of the process.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    /// `memory` (process lifetime) or `sqlite` (persisted).
    #[serde(default = "default_ledger")]
    pub ledger: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger(),
        }
    }
}

fn default_ledger() -> String {
    "memory".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendsConfig {
    #[serde(default = "default_primary")]
    pub primary: BackendConfig,
    #[serde(default = "default_secondary")]
    pub secondary: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
        }
    }
}

/// One generation backend.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// `groq`, `openai` (any OpenAI-compatible endpoint), or `ollama`.
    pub kind: String,
    pub model: String,
    /// Base URL. Defaults per kind when absent.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key (hosted kinds only).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub repeat_penalty: Option<f32>,
}

fn default_primary() -> BackendConfig {
    BackendConfig {
        kind: "groq".to_string(),
        model: "llama3-8b-8192".to_string(),
        url: None,
        api_key_env: Some("GROQ_API_KEY".to_string()),
        temperature: Some(0.7),
        max_tokens: Some(8192),
        repeat_penalty: None,
    }
}

fn default_secondary() -> BackendConfig {
    BackendConfig {
        kind: "ollama".to_string(),
        model: "gemma3:4b".to_string(),
        url: Some(default_ollama_url()),
        api_key_env: None,
        temperature: Some(0.6),
        max_tokens: None,
        repeat_penalty: Some(1.1),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutsConfig {
    #[serde(default = "default_storage_secs")]
    pub storage_secs: u64,
    #[serde(default = "default_backend_secs")]
    pub backend_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            storage_secs: default_storage_secs(),
            backend_secs: default_backend_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn storage(&self) -> Duration {
        Duration::from_secs(self.storage_secs)
    }

    pub fn backend(&self) -> Duration {
        Duration::from_secs(self.backend_secs)
    }
}

fn default_storage_secs() -> u64 {
    10
}
fn default_backend_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_prompt_language")]
    pub language: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: default_prompt_language(),
        }
    }
}

fn default_prompt_language() -> String {
    "french".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Configuration with every default and the database at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            chunking: ChunkingConfig::default(),
            normalize: NormalizeConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            dedup: DedupConfig::default(),
            backends: BackendsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            prompt: PromptConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn normalizer(&self) -> Result<Normalizer> {
        Ok(Normalizer::from_names(&self.normalize.languages)?)
    }

    pub fn prompts(&self) -> Result<Prompts> {
        let language: Language = self.prompt.language.parse()?;
        Ok(Prompts::new(language))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if let Err(e) = config.chunking.params().validate() {
        anyhow::bail!("chunking: {}", e);
    }

    // Validate normalization and prompt languages
    config.normalizer().context("normalize.languages")?;
    config.prompts().context("prompt.language")?;

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "ollama" | "hashing" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or hashing.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.dedup.ledger.as_str() {
        "memory" | "sqlite" => {}
        other => anyhow::bail!("Unknown dedup.ledger: '{}'. Must be memory or sqlite.", other),
    }

    for (name, backend) in [
        ("primary", &config.backends.primary),
        ("secondary", &config.backends.secondary),
    ] {
        match backend.kind.as_str() {
            "groq" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "backends.{}.kind: unknown backend '{}'. Must be groq, openai, or ollama.",
                name,
                other
            ),
        }
        if backend.model.trim().is_empty() {
            anyhow::bail!("backends.{}.model must not be empty", name);
        }
    }

    if config.timeouts.storage_secs == 0 || config.timeouts.backend_secs == 0 {
        anyhow::bail!("timeouts must be > 0 seconds");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str("[db]\npath = \"./data/campus.sqlite\"\n").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 850);
        assert_eq!(config.chunking.chunk_overlap, 130);
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.similarity_threshold - 0.45).abs() < 1e-6);
        assert_eq!(config.backends.primary.kind, "groq");
        assert_eq!(config.backends.secondary.model, "gemma3:4b");
        assert_eq!(config.vector_store.collection, "documents");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let config: Config = toml::from_str(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config: Config =
            toml::from_str("[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"magic\"\n")
                .unwrap();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("magic"));
    }

    #[test]
    fn test_unknown_language_rejected() {
        let config: Config =
            toml::from_str("[db]\npath = \"x.sqlite\"\n[prompt]\nlanguage = \"latin\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_backend_override() {
        let config: Config = toml::from_str(
            r#"
[db]
path = "x.sqlite"

[backends.primary]
kind = "ollama"
model = "llama3"

[backends.secondary]
kind = "openai"
model = "gpt-4o-mini"
url = "http://localhost:9999/v1"
api_key_env = "TEST_KEY"
"#,
        )
        .unwrap();
        validate(&config).unwrap();
        assert_eq!(config.backends.primary.kind, "ollama");
        assert_eq!(config.backends.primary.url, None);
        assert_eq!(config.backends.secondary.api_key_env.as_deref(), Some("TEST_KEY"));
    }
}
