use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::catalog::SourceId;
use crate::collect::{get_text, http_client, Collector};
use crate::error::CollectorError;
use crate::item::CollectedItem;

const DEFAULT_BASE: &str = "https://api.coingecko.com";

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    coins: Vec<Coin>,
}
#[derive(Debug, Deserialize)]
struct TrendingResp {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}
#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: Coin,
}
#[derive(Debug, Deserialize)]
struct Coin {
    id: String,
    name: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    market_cap_rank: Option<u64>,
}

/// CoinGecko search; the query "trending" lists trending coins instead.
pub struct CoinGeckoCollector {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoCollector {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(15)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn parse_search(json: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let resp: SearchResp = serde_json::from_str(json).map_err(CollectorError::parse)?;
        Ok(to_items(resp.coins, limit, ""))
    }

    pub fn parse_trending(json: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let resp: TrendingResp = serde_json::from_str(json).map_err(CollectorError::parse)?;
        Ok(to_items(
            resp.coins.into_iter().map(|c| c.item).collect(),
            limit,
            "Trending: ",
        ))
    }
}

fn to_items(coins: Vec<Coin>, limit: usize, prefix: &str) -> Vec<CollectedItem> {
    let src = SourceId::new("crypto");
    coins
        .into_iter()
        .take(limit)
        .map(|c| {
            let rank = c
                .market_cap_rank
                .map(|r| format!("#{r}"))
                .unwrap_or_else(|| "unranked".to_string());
            CollectedItem::new(
                &src,
                format!("{prefix}{} ({})", c.name, c.symbol.to_ascii_uppercase()),
                format!("Market cap rank: {rank}"),
                format!("https://www.coingecko.com/en/coins/{}", c.id),
            )
        })
        .collect()
}

impl Default for CoinGeckoCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for CoinGeckoCollector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<CollectedItem>, CollectorError> {
        let q = query.trim();
        if q.is_empty() || q.eq_ignore_ascii_case("trending") {
            let url = format!("{}/api/v3/search/trending", self.base_url);
            let body = get_text(&self.client, &url, &[]).await?;
            return Self::parse_trending(&body, limit);
        }
        let url = format!("{}/api/v3/search", self.base_url);
        let body = get_text(&self.client, &url, &[("query", q)]).await?;
        Self::parse_search(&body, limit)
    }

    fn id(&self) -> &'static str {
        "crypto"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_and_trending() {
        let search = r#"{"coins":[{"id":"bitcoin","name":"Bitcoin","symbol":"btc","market_cap_rank":1},{"id":"x","name":"X","symbol":"x"}]}"#;
        let items = CoinGeckoCollector::parse_search(search, 5).unwrap();
        assert_eq!(items[0].title, "Bitcoin (BTC)");
        assert_eq!(items[0].content, "Market cap rank: #1");
        assert_eq!(items[1].content, "Market cap rank: unranked");

        let trending = r#"{"coins":[{"item":{"id":"pepe","name":"Pepe","symbol":"pepe","market_cap_rank":30}}]}"#;
        let items = CoinGeckoCollector::parse_trending(trending, 5).unwrap();
        assert_eq!(items[0].title, "Trending: Pepe (PEPE)");
        assert_eq!(items[0].url, "https://www.coingecko.com/en/coins/pepe");
    }
}
