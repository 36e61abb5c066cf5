use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use super::MAX_CONTENT_CHARS;
use crate::catalog::SourceId;
use crate::collect::{get_text, http_client, Collector};
use crate::error::CollectorError;
use crate::item::{normalize_text, parse_published, CollectedItem};

const DEFAULT_BASE: &str = "http://export.arxiv.org";

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}
#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}
#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

/// arXiv Atom API (free, no key).
pub struct ArxivCollector {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivCollector {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(20)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn parse_items(xml: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let feed: Feed = from_str(xml).map_err(CollectorError::parse)?;
        let src = SourceId::new("arxiv");

        let out = feed
            .entries
            .into_iter()
            .filter_map(|e| {
                let title = normalize_text(e.title.as_deref().unwrap_or_default(), 300);
                if title.is_empty() {
                    return None;
                }
                // Prefer the abstract page, then the PDF, then the entry id.
                let abs = e
                    .links
                    .iter()
                    .find(|l| l.rel.as_deref() == Some("alternate"))
                    .and_then(|l| l.href.clone());
                let pdf = e
                    .links
                    .iter()
                    .find(|l| l.kind.as_deref() == Some("application/pdf"))
                    .and_then(|l| l.href.clone());
                let url = abs.or(pdf).or(e.id).unwrap_or_default();
                let content = normalize_text(
                    e.summary.as_deref().unwrap_or_default(),
                    MAX_CONTENT_CHARS,
                );
                let published = e.published.as_deref().and_then(parse_published);
                Some(CollectedItem::new(&src, title, content, url.trim()).with_published(published))
            })
            .take(limit)
            .collect();
        Ok(out)
    }
}

impl Default for ArxivCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for ArxivCollector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let url = format!("{}/api/query", self.base_url);
        let search = format!("all:{query}");
        let max = limit.to_string();
        let body = get_text(
            &self.client,
            &url,
            &[
                ("search_query", search.as_str()),
                ("start", "0"),
                ("max_results", max.as_str()),
                ("sortBy", "relevance"),
            ],
        )
        .await?;
        Self::parse_items(&body, limit)
    }

    fn id(&self) -> &'static str {
        "arxiv"
    }
}
