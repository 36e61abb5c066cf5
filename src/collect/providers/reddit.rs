use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::MAX_CONTENT_CHARS;
use crate::catalog::SourceId;
use crate::collect::{get_text, http_client, Collector};
use crate::error::CollectorError;
use crate::item::{normalize_text, CollectedItem};

const DEFAULT_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}
#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}
#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    score: i64,
}

/// Reddit public search JSON. `r/name` queries list that subreddit's hot posts.
pub struct RedditCollector {
    client: reqwest::Client,
    base_url: String,
}

impl RedditCollector {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(15)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn parse_items(json: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let listing: Listing = serde_json::from_str(json).map_err(CollectorError::parse)?;
        let src = SourceId::new("reddit");

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|c| c.data)
            .filter(|p| !p.title.trim().is_empty())
            .take(limit)
            .map(|p| {
                let body = normalize_text(&p.selftext, MAX_CONTENT_CHARS);
                let content = if body.is_empty() {
                    format!("r/{} · {} points", p.subreddit, p.score)
                } else {
                    body
                };
                let url = if p.permalink.is_empty() {
                    p.url
                } else {
                    format!("https://www.reddit.com{}", p.permalink)
                };
                CollectedItem::new(&src, normalize_text(&p.title, 300), content, url)
            })
            .collect())
    }
}

impl Default for RedditCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for RedditCollector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let max = limit.to_string();
        let q = query.trim();
        let body = match q.strip_prefix("r/") {
            Some(sub) if !sub.contains(char::is_whitespace) => {
                let url = format!("{}/r/{sub}/hot.json", self.base_url);
                get_text(&self.client, &url, &[("limit", max.as_str()), ("raw_json", "1")]).await?
            }
            _ => {
                let url = format!("{}/search.json", self.base_url);
                get_text(
                    &self.client,
                    &url,
                    &[
                        ("q", q),
                        ("limit", max.as_str()),
                        ("sort", "relevance"),
                        ("raw_json", "1"),
                    ],
                )
                .await?
            }
        };
        Self::parse_items(&body, limit)
    }

    fn id(&self) -> &'static str {
        "reddit"
    }
}
