//! Text generation backends and primary/secondary failover.
//!
//! Two backend kinds:
//! - **[`OpenAiCompatBackend`]**: hosted chat-completions API (Groq by
//!   default, any OpenAI-compatible endpoint otherwise).
//! - **[`OllamaBackend`]**: local Ollama `/api/generate`, read as an NDJSON
//!   stream. `<think>…</think>` reasoning blocks are stripped.
//!
//! [`FailoverGenerator`] tries the primary, then the secondary exactly once
//! with the identical prompt, each under a time limit. Running out of
//! backends is a value ([`Generation::Unavailable`]), not an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use campus_rag_core::{RagError, Result};

use crate::config::{BackendConfig, BackendsConfig};
use crate::deadline;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A single text generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;
    /// Network and protocol failures surface as `BackendUnavailable`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

fn unavailable(name: &str, detail: impl std::fmt::Display) -> RagError {
    RagError::BackendUnavailable(format!("{}: {}", name, detail))
}

// ============ OpenAI-compatible chat completions ============

pub struct OpenAiCompatBackend {
    name: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl OpenAiCompatBackend {
    /// Build from config. The API key is read from `api_key_env` now; a
    /// missing key is reported on first use so the secondary still runs.
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let base_url = match (&config.url, config.kind.as_str()) {
            (Some(url), _) => url.clone(),
            (None, "groq") => GROQ_BASE_URL.to_string(),
            (None, _) => OPENAI_BASE_URL.to_string(),
        };
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            name: config.kind.clone(),
            client: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            });

        match (&self.api_key, &self.api_key_env) {
            (Some(key), _) => request = request.bearer_auth(key),
            (None, Some(var)) => {
                return Err(unavailable(
                    &self.name,
                    format!("{} environment variable not set", var),
                ))
            }
            (None, None) => {}
        }

        let response = request
            .send()
            .await
            .map_err(|e| unavailable(&self.name, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(&self.name, format!("HTTP {}: {}", status, body)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| unavailable(&self.name, e))?;
        parse_chat_completion(&json).map_err(|e| unavailable(&self.name, e))
    }
}

fn parse_chat_completion(json: &serde_json::Value) -> std::result::Result<String, String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| "invalid response: missing choices[0].message.content".to_string())
}

// ============ Ollama ============

pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: serde_json::Value,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a serde_json::Value,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let mut options = serde_json::Map::new();
        if let Some(t) = config.temperature {
            options.insert("temperature".into(), serde_json::json!(t));
        }
        if let Some(r) = config.repeat_penalty {
            options.insert("repeat_penalty".into(), serde_json::json!(r));
        }
        if let Some(n) = config.max_tokens {
            options.insert("num_predict".into(), serde_json::json!(n));
        }

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            options: serde_json::Value::Object(options),
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: true,
                options: &self.options,
            })
            .send()
            .await
            .map_err(|e| {
                unavailable(
                    "ollama",
                    format!("connection error (is Ollama running at {}?): {}", self.base_url, e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable("ollama", format!("HTTP {}: {}", status, body)));
        }

        let mut stream = response.bytes_stream();
        let mut acc = NdjsonAccumulator::default();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| unavailable("ollama", e))?;
            if acc.push(&bytes) {
                break;
            }
        }
        Ok(strip_think(&acc.finish()).trim().to_string())
    }
}

/// Collects the `response` fields of an Ollama NDJSON stream.
///
/// Lines may be split across network chunks. Unparseable lines are skipped.
#[derive(Default)]
struct NdjsonAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl NdjsonAccumulator {
    /// Feed raw bytes. Returns `true` once a `"done": true` line was seen.
    fn push(&mut self, bytes: &[u8]) -> bool {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line);
            if self.done {
                break;
            }
        }
        self.done
    }

    fn consume_line(&mut self, line: &[u8]) {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(line) else {
            return;
        };
        if let Some(piece) = value.get("response").and_then(|r| r.as_str()) {
            self.text.push_str(piece);
        }
        if value.get("done").and_then(|d| d.as_bool()) == Some(true) {
            self.done = true;
        }
    }

    fn finish(mut self) -> String {
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.consume_line(&rest);
        }
        self.text
    }
}

/// Remove every `<think>…</think>` block. An unclosed block runs to the end.
pub fn strip_think(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Build the backend described by one `[backends.*]` table.
pub fn build_backend(config: &BackendConfig) -> anyhow::Result<Arc<dyn GenerationBackend>> {
    match config.kind.as_str() {
        "groq" | "openai" => Ok(Arc::new(OpenAiCompatBackend::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        other => bail!("Unknown backend kind: {}", other),
    }
}

// ============ Failover ============

/// Outcome of a failover generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Produced by the primary backend.
    Primary(String),
    /// The primary failed; produced by the secondary.
    Fallback(String),
    /// Every backend failed.
    Unavailable(String),
}

impl Generation {
    /// Content to show a user. `Unavailable` renders as `"Error: <reason>"`.
    pub fn text(&self) -> String {
        match self {
            Generation::Primary(text) | Generation::Fallback(text) => text.clone(),
            Generation::Unavailable(reason) => format!("Error: {}", reason),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Generation::Unavailable(_))
    }

    /// Which backend answered: `primary`, `fallback`, or `unavailable`.
    pub fn source(&self) -> &'static str {
        match self {
            Generation::Primary(_) => "primary",
            Generation::Fallback(_) => "fallback",
            Generation::Unavailable(_) => "unavailable",
        }
    }
}

pub struct FailoverGenerator {
    primary: Arc<dyn GenerationBackend>,
    secondary: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl FailoverGenerator {
    pub fn new(
        primary: Arc<dyn GenerationBackend>,
        secondary: Arc<dyn GenerationBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
        }
    }

    pub fn from_config(config: &BackendsConfig, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(
            build_backend(&config.primary)?,
            build_backend(&config.secondary)?,
            timeout,
        ))
    }

    pub async fn generate(&self, prompt: &str) -> Generation {
        let primary_err = match deadline::backend(
            self.timeout,
            self.primary.name(),
            self.primary.generate(prompt),
        )
        .await
        {
            Ok(text) => {
                info!(backend = self.primary.name(), "generation succeeded");
                return Generation::Primary(text);
            }
            Err(e) => e,
        };
        warn!(
            backend = self.primary.name(),
            error = %primary_err,
            "primary backend failed, falling back to {}",
            self.secondary.name()
        );

        match deadline::backend(
            self.timeout,
            self.secondary.name(),
            self.secondary.generate(prompt),
        )
        .await
        {
            Ok(text) => {
                info!(backend = self.secondary.name(), "generation succeeded");
                Generation::Fallback(text)
            }
            Err(e) => {
                warn!(backend = self.secondary.name(), error = %e, "all backends failed");
                Generation::Unavailable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        name: &'static str,
        reply: Option<&'static str>,
        delay: Option<Duration>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(name: &'static str, reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                delay: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply
                .map(str::to_string)
                .ok_or_else(|| RagError::BackendUnavailable(format!("{} down", self.name)))
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = Scripted::new("groq", Some("bonjour"));
        let secondary = Scripted::new("ollama", Some("salut"));
        let gen = FailoverGenerator::new(primary.clone(), secondary.clone(), Duration::from_secs(1));
        assert_eq!(gen.generate("p").await, Generation::Primary("bonjour".into()));
        assert!(secondary.calls().is_empty());
    }

    #[tokio::test]
    async fn test_secondary_called_once_with_same_prompt() {
        let primary = Scripted::new("groq", None);
        let secondary = Scripted::new("ollama", Some("salut"));
        let gen = FailoverGenerator::new(primary.clone(), secondary.clone(), Duration::from_secs(1));
        let out = gen.generate("Question : quoi ?").await;
        assert_eq!(out, Generation::Fallback("salut".into()));
        assert_eq!(secondary.calls(), vec!["Question : quoi ?".to_string()]);
    }

    #[tokio::test]
    async fn test_both_fail_is_error_marker() {
        let gen = FailoverGenerator::new(
            Scripted::new("groq", None),
            Scripted::new("ollama", None),
            Duration::from_secs(1),
        );
        let out = gen.generate("p").await;
        assert!(!out.is_available());
        assert!(out.text().starts_with("Error: "));
        assert!(out.text().contains("ollama down"));
    }

    #[tokio::test]
    async fn test_primary_timeout_falls_back() {
        let slow = Arc::new(Scripted {
            name: "groq",
            reply: Some("late"),
            delay: Some(Duration::from_secs(10)),
            prompts: Mutex::new(Vec::new()),
        });
        let gen = FailoverGenerator::new(
            slow,
            Scripted::new("ollama", Some("fast")),
            Duration::from_millis(20),
        );
        assert_eq!(gen.generate("p").await, Generation::Fallback("fast".into()));
    }

    #[test]
    fn test_strip_think() {
        assert_eq!(strip_think("<think>hmm</think>Réponse"), "Réponse");
        assert_eq!(strip_think("a<think>x</think>b<think>y</think>c"), "abc");
        assert_eq!(strip_think("avant<think>jamais fermé"), "avant");
        assert_eq!(strip_think("rien"), "rien");
    }

    #[test]
    fn test_ndjson_split_across_chunks() {
        let mut acc = NdjsonAccumulator::default();
        assert!(!acc.push(b"{\"response\":\"Bon\",\"done\":false}\n{\"respo"));
        assert!(!acc.push(b"nse\":\"jour\",\"done\":false}\n"));
        assert!(acc.push(b"{\"response\":\"\",\"done\":true}\n{\"response\":\"ignored\"}\n"));
        assert_eq!(acc.finish(), "Bonjour");
    }

    #[test]
    fn test_ndjson_skips_garbage_and_flushes_tail() {
        let mut acc = NdjsonAccumulator::default();
        acc.push(b"not json\n{\"response\":\"a\"}\n{\"response\":\"b\"}");
        assert_eq!(acc.finish(), "ab");
    }

    #[test]
    fn test_parse_chat_completion() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Salut" } }]
        });
        assert_eq!(parse_chat_completion(&json).unwrap(), "Salut");
        assert!(parse_chat_completion(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_build_backend_default_urls() {
        let groq = OpenAiCompatBackend::new(&BackendConfig {
            kind: "groq".into(),
            model: "llama3-8b-8192".into(),
            url: None,
            api_key_env: None,
            temperature: Some(0.7),
            max_tokens: Some(8192),
            repeat_penalty: None,
        })
        .unwrap();
        assert_eq!(groq.base_url, GROQ_BASE_URL);
        assert!(build_backend(&BackendConfig {
            kind: "bard".into(),
            model: "x".into(),
            url: None,
            api_key_env: None,
            temperature: None,
            max_tokens: None,
            repeat_penalty: None,
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let backend = OpenAiCompatBackend::new(&BackendConfig {
            kind: "openai".into(),
            model: "gpt-4o-mini".into(),
            url: Some("http://127.0.0.1:9".into()),
            api_key_env: Some("CAMPUS_RAG_TEST_KEY_THAT_IS_NOT_SET".into()),
            temperature: None,
            max_tokens: None,
            repeat_penalty: None,
        })
        .unwrap();
        let err = backend.generate("p").await.unwrap_err();
        assert!(matches!(err, RagError::BackendUnavailable(ref m) if m.contains("not set")));
    }
}
