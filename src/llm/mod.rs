//! LLM chat backends: provider abstraction + factory.
//!
//! The classifier and synthesizer capabilities sit on top of a single
//! [`ChatBackend`], so the same wiring serves Ollama, OpenRouter, OpenAI,
//! a deterministic mock and a disabled stub.

pub mod classifier;
pub mod synthesizer;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;

pub use classifier::LlmClassifier;
pub use synthesizer::LlmSynthesizer;

const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
const OPENAI_BASE: &str = "https://api.openai.com/v1";
const OLLAMA_BASE: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

/// Low-level provider doing the actual remote call.
pub trait ChatBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        model: &'a str,
        temperature: f32,
    ) -> ChatFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynChatBackend = Arc<dyn ChatBackend>;

/// Factory: build a backend according to config and environment.
///
/// * If `RELAY_LLM_MODE=mock`, returns a deterministic mock.
/// * Else picks the configured provider; "disabled" always errors.
pub fn build_backend(config: &LlmConfig) -> DynChatBackend {
    if std::env::var("RELAY_LLM_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(
            MockBackend::new("*Key Takeaway* mock briefing; no model was called.")
                .with_router_reply(r#"{"source": "news", "query": ""}"#),
        );
    }

    let base = config.base_url.clone();
    match config.provider.as_str() {
        "ollama" => Arc::new(OllamaBackend::new(
            base.unwrap_or_else(|| OLLAMA_BASE.to_string()),
        )),
        "openrouter" => Arc::new(OpenAiCompatBackend::new(
            "openrouter",
            base.unwrap_or_else(|| OPENROUTER_BASE.to_string()),
            config.api_key.clone(),
        )),
        "openai" => Arc::new(OpenAiCompatBackend::new(
            "openai",
            base.unwrap_or_else(|| OPENAI_BASE.to_string()),
            config.api_key.clone(),
        )),
        _ => Arc::new(DisabledBackend),
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(crate::collect::USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ------------------------------------------------------------
// OpenAI-compatible chat completions (OpenRouter, OpenAI)
// ------------------------------------------------------------

pub struct OpenAiCompatBackend {
    name: &'static str,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatBackend {
    pub fn new(name: &'static str, base_url: impl Into<String>, api_key: String) -> Self {
        Self {
            name,
            http: http_client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl ChatBackend for OpenAiCompatBackend {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        model: &'a str,
        temperature: f32,
    ) -> ChatFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(LlmError::Disabled);
            }

            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: &'a [ChatMessage],
                temperature: f32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: String,
            }

            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&Req {
                    model,
                    messages,
                    temperature,
                })
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(LlmError::Status(status.as_u16()));
            }
            let body: Resp = resp.json().await?;
            let content = body
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .unwrap_or_default();
            non_empty(content)
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

// ------------------------------------------------------------
// Ollama (/api/chat, non-streaming)
// ------------------------------------------------------------

pub struct OllamaBackend {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: http_client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ChatBackend for OllamaBackend {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        model: &'a str,
        temperature: f32,
    ) -> ChatFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Options {
                temperature: f32,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: &'a [ChatMessage],
                stream: bool,
                options: Options,
            }
            #[derive(Deserialize)]
            struct Resp {
                message: RespMsg,
            }
            #[derive(Deserialize)]
            struct RespMsg {
                #[serde(default)]
                content: String,
            }

            let resp = self
                .http
                .post(format!("{}/api/chat", self.base_url))
                .json(&Req {
                    model,
                    messages,
                    stream: false,
                    options: Options { temperature },
                })
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(LlmError::Status(status.as_u16()));
            }
            let body: Resp = resp.json().await?;
            non_empty(body.message.content)
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

// ------------------------------------------------------------
// Mock + disabled
// ------------------------------------------------------------

/// Deterministic backend for tests and local runs. Routing prompts get
/// `router_reply` when one is set; every other prompt gets `reply`.
#[derive(Clone)]
pub struct MockBackend {
    reply: String,
    router_reply: Option<String>,
}

impl MockBackend {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            router_reply: None,
        }
    }

    pub fn with_router_reply(mut self, reply: impl Into<String>) -> Self {
        self.router_reply = Some(reply.into());
        self
    }

    fn reply_for(&self, messages: &[ChatMessage]) -> &str {
        let routing = messages
            .iter()
            .any(|m| m.role == "system" && m.content.starts_with(classifier::ROUTER_PREAMBLE));
        match &self.router_reply {
            Some(r) if routing => r,
            _ => &self.reply,
        }
    }
}

impl ChatBackend for MockBackend {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        _model: &'a str,
        _temperature: f32,
    ) -> ChatFuture<'a> {
        let out = self.reply_for(messages).to_string();
        Box::pin(async move { non_empty(out) })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails with `LlmError::Disabled`; routing then falls back to the
/// default source and synthesis degrades to a plain listing.
pub struct DisabledBackend;

impl ChatBackend for DisabledBackend {
    fn complete<'a>(
        &'a self,
        _messages: &'a [ChatMessage],
        _model: &'a str,
        _temperature: f32,
    ) -> ChatFuture<'a> {
        Box::pin(async { Err(LlmError::Disabled) })
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

fn non_empty(content: String) -> Result<String, LlmError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        Err(LlmError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}
