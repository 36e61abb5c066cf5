use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use super::MAX_CONTENT_CHARS;
use crate::catalog::SourceId;
use crate::collect::{get_text, http_client, Collector};
use crate::error::CollectorError;
use crate::item::{normalize_text, parse_published, CollectedItem};

const DEFAULT_BASE: &str = "https://news.google.com";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Google News RSS search (free, no key).
pub struct GoogleNewsCollector {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleNewsCollector {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(15)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn parse_items(xml: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let rss: Rss = from_str(&scrub_entities_for_xml(xml)).map_err(CollectorError::parse)?;
        let src = SourceId::new("news");

        let mut out = Vec::with_capacity(rss.channel.item.len().min(limit));
        for it in rss.channel.item {
            if out.len() >= limit {
                break;
            }
            let title = normalize_text(it.title.as_deref().unwrap_or_default(), 300);
            if title.is_empty() {
                continue;
            }
            let content = normalize_text(
                it.description.as_deref().unwrap_or_default(),
                MAX_CONTENT_CHARS,
            );
            let published = it.pub_date.as_deref().and_then(parse_published);
            out.push(
                CollectedItem::new(&src, title, content, it.link.unwrap_or_default().trim())
                    .with_published(published),
            );
        }
        Ok(out)
    }
}

impl Default for GoogleNewsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for GoogleNewsCollector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let url = format!("{}/rss/search", self.base_url);
        let body = get_text(
            &self.client,
            &url,
            &[("q", query), ("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")],
        )
        .await?;
        Self::parse_items(&body, limit)
    }

    fn id(&self) -> &'static str {
        "news"
    }
}

/// XML only knows five named entities; feeds routinely carry HTML ones.
fn scrub_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
