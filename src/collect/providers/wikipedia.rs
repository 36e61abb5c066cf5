use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::MAX_CONTENT_CHARS;
use crate::catalog::SourceId;
use crate::collect::{get_text, http_client, Collector};
use crate::error::CollectorError;
use crate::item::{normalize_text, CollectedItem};

const DEFAULT_BASE: &str = "https://en.wikipedia.org";

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    query: Option<SearchQuery>,
}
#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<Hit>,
}
#[derive(Debug, Deserialize)]
struct Hit {
    title: String,
    #[serde(default)]
    snippet: String,
}

/// MediaWiki full-text search.
pub struct WikipediaCollector {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaCollector {
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
        let resp: SearchResp = serde_json::from_str(json).map_err(CollectorError::parse)?;
        let src = SourceId::new("wikipedia");
        let hits = resp.query.map(|q| q.search).unwrap_or_default();

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|h| {
                let url = format!("https://en.wikipedia.org/wiki/{}", h.title.replace(' ', "_"));
                CollectedItem::new(
                    &src,
                    h.title.trim(),
                    normalize_text(&h.snippet, MAX_CONTENT_CHARS),
                    url,
                )
            })
            .collect())
    }
}

impl Default for WikipediaCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for WikipediaCollector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let url = format!("{}/w/api.php", self.base_url);
        let max = limit.to_string();
        let body = get_text(
            &self.client,
            &url,
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", max.as_str()),
                ("format", "json"),
            ],
        )
        .await?;
        Self::parse_items(&body, limit)
    }

    fn id(&self) -> &'static str {
        "wikipedia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_hits() {
        let json = r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[
            {"ns":0,"title":"Rust (programming language)","pageid":1,"snippet":"<span class=\"searchmatch\">Rust</span> is a language"},
            {"ns":0,"title":"Rust","pageid":2,"snippet":""}
        ]}}"#;
        let items = WikipediaCollector::parse_items(json, 5).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "Rust is a language");
        assert_eq!(
            items[0].url,
            "https://en.wikipedia.org/wiki/Rust_(programming_language)"
        );
        assert_eq!(items[1].source.as_str(), "wikipedia");
    }

    #[test]
    fn missing_query_block_is_empty() {
        let items = WikipediaCollector::parse_items(r#"{"batchcomplete":""}"#, 5).unwrap();
        assert!(items.is_empty());
    }
}
