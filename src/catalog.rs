//! # Source Catalog
//!
//! Read-only mapping from a source id (e.g. "news", "arxiv") to its ordered
//! fallback chain, plus the set of ids the router may choose from.
//!
//! - Built once at startup and shared by reference across runs.
//! - Loads from TOML (`[chains]` table) or a JSON object; falls back to
//!   `default_seed()` when no file is present.
//! - Chains never contain their own key and never repeat an entry; both
//!   are dropped at construction.
//! - Unknown ids have an empty chain. Lookups never fail.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CATALOG_PATH: &str = "RELAY_CATALOG_PATH";

/// Opaque source identifier. Trimmed and lower-cased on construction so
/// "News " and "news" name the same source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    chains: BTreeMap<SourceId, Vec<SourceId>>,
    known: BTreeSet<SourceId>,
}

impl SourceCatalog {
    /// Build from raw chains. The known set is every key and every chain member.
    pub fn new<I, K, V>(chains: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<SourceId>,
        V: Into<SourceId>,
    {
        let mut out = Self::default();
        for (key, raw) in chains {
            let key: SourceId = key.into();
            let mut chain: Vec<SourceId> = Vec::with_capacity(raw.len());
            for entry in raw {
                let entry: SourceId = entry.into();
                if entry.as_str().is_empty() {
                    continue;
                }
                if entry == key {
                    tracing::warn!(source = %key, "dropping self reference from fallback chain");
                    continue;
                }
                if chain.contains(&entry) {
                    tracing::warn!(source = %key, duplicate = %entry, "dropping duplicate fallback");
                    continue;
                }
                chain.push(entry);
            }
            out.known.insert(key.clone());
            out.known.extend(chain.iter().cloned());
            out.chains.insert(key, chain);
        }
        out
    }

    /// Extend the known set, e.g. with every registered collector id.
    pub fn with_known<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceId>,
    {
        self.known.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Ordered fallbacks for `source`; empty for unknown or chain-less ids.
    pub fn fallbacks_for(&self, source: &SourceId) -> &[SourceId] {
        self.chains.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_known(&self, source: &SourceId) -> bool {
        self.known.contains(source)
    }

    pub fn known(&self) -> &BTreeSet<SourceId> {
        &self.known
    }

    /// Built-in chains for the bundled collectors.
    pub fn default_seed() -> Self {
        Self::new([
            ("news", vec!["wikipedia", "reddit"]),
            ("wikipedia", vec!["news", "reddit"]),
            ("arxiv", vec!["github", "news"]),
            ("crypto", vec!["news", "reddit"]),
            ("reddit", vec!["news", "wikipedia"]),
            ("github", vec!["news", "reddit"]),
        ])
    }

    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading fallback catalog from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_catalog(&content, &ext)
    }

    /// Resolve the catalog file:
    /// 1) $RELAY_CATALOG_PATH
    /// 2) config/fallbacks.toml
    /// 3) config/fallbacks.json
    /// 4) built-in seed
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CATALOG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CATALOG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for candidate in ["config/fallbacks.toml", "config/fallbacks.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default_seed())
    }
}

fn parse_catalog(s: &str, hint_ext: &str) -> Result<SourceCatalog> {
    #[derive(Deserialize)]
    struct TomlCatalog {
        chains: BTreeMap<String, Vec<String>>,
    }

    if hint_ext == "toml" || s.contains("[chains]") {
        if let Ok(v) = toml::from_str::<TomlCatalog>(s) {
            return Ok(SourceCatalog::new(v.chains));
        }
    }
    if let Ok(v) = serde_json::from_str::<BTreeMap<String, Vec<String>>>(s) {
        return Ok(SourceCatalog::new(v));
    }
    let v: TomlCatalog = toml::from_str(s).context("unsupported fallback catalog format")?;
    Ok(SourceCatalog::new(v.chains))
}
