//! # Router
//! Turns free text into a validated [`SourceId`]. This is the only place
//! free text is interpreted; everything downstream sees catalog ids.
//!
//! Routing never aborts a run: an unknown id, a classifier error or a
//! timeout all resolve to the configured default source.

use async_trait::async_trait;
use metrics::counter;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{SourceCatalog, SourceId};
use crate::error::ClassifyError;

/// Raw classifier answer, not yet validated against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub source: String,
    /// Refined search terms, when the classifier extracted any.
    pub query: Option<String>,
}

/// Fast text-classification capability asked to choose among `known` ids.
/// `model` overrides the implementation's configured model for one call.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        query: &str,
        known: &BTreeSet<SourceId>,
        model: Option<&str>,
    ) -> Result<Classification, ClassifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub source: SourceId,
    pub search_query: String,
    /// True when the default source was substituted.
    pub fallback_used: bool,
}

#[derive(Clone)]
pub struct QueryRouter {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<SourceCatalog>,
    default_source: SourceId,
    timeout: Duration,
}

impl QueryRouter {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        catalog: Arc<SourceCatalog>,
        default_source: SourceId,
        timeout: Duration,
    ) -> Self {
        if !catalog.is_known(&default_source) {
            tracing::warn!(target: "relay::route", default = %default_source, "default source is not in the catalog");
        }
        Self {
            classifier,
            catalog,
            default_source,
            timeout,
        }
    }

    pub fn default_source(&self) -> &SourceId {
        &self.default_source
    }

    pub async fn route(&self, query: &str, model: Option<&str>) -> RouteDecision {
        let query = query.trim();
        if query.is_empty() {
            return self.fallback(query, "blank query");
        }

        let res = tokio::time::timeout(
            self.timeout,
            self.classifier.classify(query, self.catalog.known(), model),
        )
        .await
        .unwrap_or(Err(ClassifyError::Timeout(self.timeout)));

        match res {
            Ok(c) => {
                let source = SourceId::new(&c.source);
                if !self.catalog.is_known(&source) {
                    tracing::info!(target: "relay::route", returned = %c.source, "classifier picked an unknown source");
                    return self.fallback(query, "unknown source");
                }
                let search_query = c
                    .query
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .unwrap_or_else(|| query.to_string());
                tracing::info!(target: "relay::route", source = %source, search_query = %search_query, "routed");
                RouteDecision {
                    source,
                    search_query,
                    fallback_used: false,
                }
            }
            Err(e) => {
                tracing::warn!(target: "relay::route", error = %e, "classifier failed");
                self.fallback(query, "classifier error")
            }
        }
    }

    fn fallback(&self, query: &str, why: &'static str) -> RouteDecision {
        counter!("relay_route_fallback_total", "reason" => why).increment(1);
        RouteDecision {
            source: self.default_source.clone(),
            search_query: query.to_string(),
            fallback_used: true,
        }
    }
}
