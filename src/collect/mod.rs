// src/collect/mod.rs
pub mod providers;

use async_trait::async_trait;
use metrics::{counter, histogram};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::SourceId;
use crate::error::CollectorError;
use crate::item::CollectedItem;

pub const USER_AGENT: &str = "research-relay/0.1 (+https://github.com/research-relay)";

/// One data source. An empty result is a valid, non-error outcome.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError>;
    fn id(&self) -> &'static str;
}

/// Collector capability as seen by the controller: resolve the source and fetch.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceId,
        query: &str,
    ) -> Result<Vec<CollectedItem>, CollectorError>;
}

/// Flat dispatch table from source id to collector, resolved at startup.
#[derive(Clone)]
pub struct CollectorRegistry {
    collectors: BTreeMap<SourceId, Arc<dyn Collector>>,
    limit: usize,
}

impl CollectorRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            collectors: BTreeMap::new(),
            limit: limit.max(1),
        }
    }

    /// Registry with every bundled provider on its public endpoint.
    pub fn with_defaults(limit: usize) -> Self {
        let mut reg = Self::new(limit);
        reg.register(providers::google_news::GoogleNewsCollector::new());
        reg.register(providers::wikipedia::WikipediaCollector::new());
        reg.register(providers::reddit::RedditCollector::new());
        reg.register(providers::github::GithubCollector::new());
        reg.register(providers::arxiv::ArxivCollector::new());
        reg.register(providers::coingecko::CoinGeckoCollector::new());
        reg
    }

    pub fn register<C: Collector + 'static>(&mut self, collector: C) -> &mut Self {
        self.collectors
            .insert(SourceId::new(collector.id()), Arc::new(collector));
        self
    }

    pub fn get(&self, source: &SourceId) -> Option<Arc<dyn Collector>> {
        self.collectors.get(source).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.collectors.keys()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fetch with an explicit limit (used by the direct `/collect` endpoint).
    pub async fn fetch_with_limit(
        &self,
        source: &SourceId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CollectedItem>, CollectorError> {
        let collector = self
            .get(source)
            .ok_or_else(|| CollectorError::UnknownSource(source.to_string()))?;

        let t0 = Instant::now();
        let res = collector.fetch(query, limit.max(1)).await;
        histogram!("relay_collect_ms", "source" => source.to_string())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        match &res {
            Ok(items) => {
                tracing::debug!(target: "relay::collect", source = %source, items = items.len(), "collector returned");
            }
            Err(e) => {
                tracing::warn!(target: "relay::collect", source = %source, error = %e, "collector error");
                counter!("relay_collector_errors_total", "source" => source.to_string())
                    .increment(1);
            }
        }
        res
    }
}

#[async_trait]
impl Fetch for CollectorRegistry {
    async fn fetch(
        &self,
        source: &SourceId,
        query: &str,
    ) -> Result<Vec<CollectedItem>, CollectorError> {
        self.fetch_with_limit(source, query, self.limit).await
    }
}

/// Shared reqwest client for collectors.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default reqwest client");
            reqwest::Client::new()
        })
}

/// GET `url` and return the body, mapping non-2xx to `CollectorError::Status`.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<String, CollectorError> {
    let resp = client.get(url).query(params).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(CollectorError::Status(status.as_u16()));
    }
    Ok(resp.text().await?)
}
