//! Runtime configuration.
//!
//! Resolution order for the file: `$RELAY_CONFIG_PATH`, `config/relay.toml`,
//! `config/relay.json`, then built-in defaults. `RELAY_MAX_RETRIES` and
//! `RELAY_DEFAULT_SOURCE` override whatever the file says.

pub mod llm;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use llm::LlmConfig;

pub const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
pub const ENV_MAX_RETRIES: &str = "RELAY_MAX_RETRIES";
pub const ENV_DEFAULT_SOURCE: &str = "RELAY_DEFAULT_SOURCE";

fn default_max_retries() -> u32 {
    2
}
fn default_source() -> String {
    "news".to_string()
}
fn default_collect_limit() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Fallback retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// General-purpose source used when routing is ambiguous or fails.
    #[serde(default = "default_source")]
    pub default_source: String,
    /// Items requested from each collector.
    #[serde(default = "default_collect_limit")]
    pub collect_limit: usize,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            default_source: default_source(),
            collect_limit: default_collect_limit(),
            timeouts: TimeoutConfig::default(),
            synthesis: SynthesisConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Per-call timeouts in seconds. Zero means "use the default".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "TimeoutConfig::default_classify")]
    pub classify_secs: u64,
    #[serde(default = "TimeoutConfig::default_collect")]
    pub collect_secs: u64,
    #[serde(default = "TimeoutConfig::default_synthesize")]
    pub synthesize_secs: u64,
}

impl TimeoutConfig {
    fn default_classify() -> u64 {
        15
    }
    fn default_collect() -> u64 {
        20
    }
    fn default_synthesize() -> u64 {
        120
    }

    pub fn classify(&self) -> Duration {
        Duration::from_secs(self.classify_secs)
    }
    pub fn collect(&self) -> Duration {
        Duration::from_secs(self.collect_secs)
    }
    pub fn synthesize(&self) -> Duration {
        Duration::from_secs(self.synthesize_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classify_secs: Self::default_classify(),
            collect_secs: Self::default_collect(),
            synthesize_secs: Self::default_synthesize(),
        }
    }
}

/// How much collected material reaches the synthesis prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "SynthesisConfig::default_max_items")]
    pub max_items: usize,
    #[serde(default = "SynthesisConfig::default_max_content_chars")]
    pub max_content_chars: usize,
}

impl SynthesisConfig {
    fn default_max_items() -> usize {
        5
    }
    fn default_max_content_chars() -> usize {
        500
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_items: Self::default_max_items(),
            max_content_chars: Self::default_max_content_chars(),
        }
    }
}

impl RelayConfig {
    /// Load from an explicit path (TOML or JSON), then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: RelayConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg.finish())
    }

    /// Resolve the config file via env var and well-known paths; defaults otherwise.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for candidate in ["config/relay.toml", "config/relay.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default().finish())
    }

    fn finish(mut self) -> Self {
        if let Ok(v) = std::env::var(ENV_MAX_RETRIES) {
            match v.trim().parse::<u32>() {
                Ok(n) => self.max_retries = n,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid {ENV_MAX_RETRIES}"),
            }
        }
        if let Ok(v) = std::env::var(ENV_DEFAULT_SOURCE) {
            if !v.trim().is_empty() {
                self.default_source = v;
            }
        }
        self.sanitize()
    }

    fn sanitize(mut self) -> Self {
        self.default_source = self.default_source.trim().to_ascii_lowercase();
        if self.default_source.is_empty() {
            self.default_source = default_source();
        }
        self.collect_limit = self.collect_limit.max(1);

        let d = TimeoutConfig::default();
        if self.timeouts.classify_secs == 0 {
            self.timeouts.classify_secs = d.classify_secs;
        }
        if self.timeouts.collect_secs == 0 {
            self.timeouts.collect_secs = d.collect_secs;
        }
        if self.timeouts.synthesize_secs == 0 {
            self.timeouts.synthesize_secs = d.synthesize_secs;
        }

        self.synthesis.max_items = self.synthesis.max_items.max(1);
        if self.synthesis.max_content_chars == 0 {
            self.synthesis.max_content_chars = SynthesisConfig::default_max_content_chars();
        }

        self.llm = self.llm.resolve();
        self
    }
}
