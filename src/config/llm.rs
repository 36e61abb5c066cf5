// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" | "openrouter" | "openai" | "disabled" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Backend base URL; each provider has its own default when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Fast model used for routing.
    #[serde(default = "default_model")]
    pub model: String,
    /// Larger model used for synthesis; falls back to `model`.
    #[serde(default)]
    pub analysis_model: Option<String>,
    /// "ENV" means: read from OPENROUTER_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            analysis_model: None,
            api_key: default_api_key(),
        }
    }
}

impl LlmConfig {
    /// Normalize the provider name and resolve an `"ENV"` api key.
    /// Unknown providers degrade to "disabled" instead of failing startup.
    pub fn resolve(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();
        if !matches!(
            self.provider.as_str(),
            "ollama" | "openrouter" | "openai" | "disabled"
        ) {
            tracing::warn!(provider = %self.provider, "unsupported llm provider, disabling");
            self.provider = "disabled".to_string();
        }

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openrouter" => env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                _ => String::new(),
            };
        }

        if self
            .analysis_model
            .as_deref()
            .is_some_and(|m| m.trim().is_empty())
        {
            self.analysis_model = None;
        }
        self
    }

    pub fn synthesis_model(&self) -> &str {
        self.analysis_model.as_deref().unwrap_or(&self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_becomes_disabled() {
        let cfg = LlmConfig {
            provider: "Claude".into(),
            ..LlmConfig::default()
        }
        .resolve();
        assert_eq!(cfg.provider, "disabled");
        assert!(cfg.api_key.is_empty());
    }

    #[test]
    fn synthesis_model_falls_back_to_model() {
        let cfg = LlmConfig {
            analysis_model: Some("  ".into()),
            ..LlmConfig::default()
        }
        .resolve();
        assert_eq!(cfg.synthesis_model(), "llama3.1:8b");
    }
}
