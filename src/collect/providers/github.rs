use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::MAX_CONTENT_CHARS;
use crate::catalog::SourceId;
use crate::collect::{http_client, Collector};
use crate::error::CollectorError;
use crate::item::{normalize_text, CollectedItem};

const DEFAULT_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    items: Vec<Repo>,
}
#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
}

/// GitHub repository search. Unauthenticated calls get 60 requests/hour;
/// `GITHUB_TOKEN` raises that.
pub struct GithubCollector {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubCollector {
    pub fn new() -> Self {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::with_base_url(DEFAULT_BASE).with_token(token)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(15)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn parse_items(json: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let resp: SearchResp = serde_json::from_str(json).map_err(CollectorError::parse)?;
        let src = SourceId::new("github");

        Ok(resp
            .items
            .into_iter()
            .take(limit)
            .map(|r| {
                let desc = normalize_text(r.description.as_deref().unwrap_or_default(), MAX_CONTENT_CHARS);
                let lang = r.language.unwrap_or_else(|| "n/a".to_string());
                let content = if desc.is_empty() {
                    format!("Language: {lang}")
                } else {
                    format!("{desc} (Language: {lang})")
                };
                CollectedItem::new(
                    &src,
                    format!("{} ({} stars)", r.full_name, r.stargazers_count),
                    content,
                    r.html_url,
                )
            })
            .collect())
    }
}

impl Default for GithubCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for GithubCollector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let url = format!("{}/search/repositories", self.base_url);
        let per_page = limit.to_string();
        let mut req = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[
                ("q", query),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CollectorError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        Self::parse_items(&body, limit)
    }

    fn id(&self) -> &'static str {
        "github"
    }
}
