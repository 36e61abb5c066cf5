//! # Pipeline
//! The contract exposed to callers (HTTP API, bots, schedulers):
//! route → collect with fallback → synthesize or narrate.
//!
//! Runs are independent; they share only the read-only catalog and the
//! capability handles. A run always yields a response unless synthesis
//! fails after a successful collection, and even then the raw items come
//! back inside the error.

use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{merge, SourceReport};
use crate::catalog::{SourceCatalog, SourceId};
use crate::collect::Fetch;
use crate::config::{RelayConfig, SynthesisConfig, TimeoutConfig};
use crate::controller::{FallbackController, PipelineState};
use crate::error::{PipelineError, SynthesisError};
use crate::item::CollectedItem;
use crate::outcome::{assemble, degraded_listing, Assembly, SynthesisRequest, Synthesizer};
use crate::routing::{Classifier, QueryRouter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub query: String,
    pub search_query: String,
    pub trail: Vec<SourceId>,
    pub source_used: Option<SourceId>,
    pub items: Vec<CollectedItem>,
    /// Synthesis output on success, failure narrative on exhaustion,
    /// unsynthesized listing on a degraded response.
    pub text: String,
    pub succeeded: bool,
    pub sources: Vec<SourceReport>,
    /// Synthesis model the run used; absent when synthesis never ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// Per-run choices a caller may make. Blank strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip the router and start here.
    pub source: Option<SourceId>,
    /// Routing model override.
    pub model: Option<String>,
    /// Synthesis model override.
    pub analysis_model: Option<String>,
}

impl RunOptions {
    pub fn forced(source: Option<SourceId>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    fn normalized(&self) -> Self {
        fn keep(m: &Option<String>) -> Option<String> {
            m.as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        }
        Self {
            source: self.source.clone().filter(|s| !s.as_str().is_empty()),
            model: keep(&self.model),
            analysis_model: keep(&self.analysis_model),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub timeouts: TimeoutConfig,
    pub synthesis: SynthesisConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeouts: TimeoutConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl From<&RelayConfig> for PipelineSettings {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            timeouts: cfg.timeouts,
            synthesis: cfg.synthesis,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    catalog: Arc<SourceCatalog>,
    router: QueryRouter,
    fetcher: Arc<dyn Fetch>,
    synthesizer: Arc<dyn Synthesizer>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<SourceCatalog>,
        classifier: Arc<dyn Classifier>,
        fetcher: Arc<dyn Fetch>,
        synthesizer: Arc<dyn Synthesizer>,
        default_source: SourceId,
        settings: PipelineSettings,
    ) -> Self {
        let router = QueryRouter::new(
            classifier,
            catalog.clone(),
            default_source,
            settings.timeouts.classify(),
        );
        Self {
            catalog,
            router,
            fetcher,
            synthesizer,
            settings,
        }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        query: &str,
        forced: Option<SourceId>,
    ) -> Result<RunReport, PipelineError> {
        self.run_cancellable(query, forced, &CancellationToken::new())
            .await
    }

    /// Same as [`Pipeline::run`], aborting at the next suspension point once
    /// `cancel` fires. Nothing shared is touched by an aborted run.
    pub async fn run_cancellable(
        &self,
        query: &str,
        forced: Option<SourceId>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        self.run_with(query, &RunOptions::forced(forced), cancel)
            .await
    }

    /// Entry point taking the full set of per-run choices; the other `run*`
    /// methods delegate here.
    pub async fn run_with(
        &self,
        query: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let query = query.trim();
        let options = options.normalized();

        let (initial, search_query) = match options.source {
            Some(source) => {
                tracing::info!(target: "relay::route", source = %source, "forced source, skipping router");
                (source, query.to_string())
            }
            None => {
                let decision = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    d = self.router.route(query, options.model.as_deref()) => d,
                };
                (decision.source, decision.search_query)
            }
        };

        let controller = FallbackController::new(&self.catalog, self.settings.max_retries);
        let mut state = PipelineState::new(query, search_query);
        controller.begin(&mut state, initial)?;
        if let Err(e) = controller
            .drive(
                &mut state,
                self.fetcher.as_ref(),
                self.settings.timeouts.collect(),
                cancel,
            )
            .await
        {
            if matches!(e, PipelineError::Cancelled) {
                counter!("relay_runs_total", "outcome" => "cancelled").increment(1);
            }
            return Err(e);
        }

        let agg = merge(state.attempts());
        let mut report = RunReport {
            query: query.to_string(),
            search_query: state.search_query().to_string(),
            trail: agg.trail,
            source_used: agg.source_used,
            items: agg.items,
            text: String::new(),
            succeeded: false,
            sources: agg.sources,
            model_used: None,
        };

        match assemble(&state)? {
            Assembly::Narrative(n) => {
                counter!("relay_runs_total", "outcome" => "exhausted").increment(1);
                tracing::info!(target: "relay::pipeline", trail = ?n.trail, "run exhausted");
                report.text = n.text;
                Ok(report)
            }
            Assembly::Synthesize(mut req) => {
                req.model = options.analysis_model;
                report.model_used = req
                    .model
                    .clone()
                    .or_else(|| self.synthesizer.default_model().map(str::to_string));
                match self.synthesize(&req, cancel).await {
                    Ok(text) => {
                        counter!("relay_runs_total", "outcome" => "succeeded").increment(1);
                        tracing::info!(
                            target: "relay::pipeline",
                            source = %req.source,
                            items = report.items.len(),
                            retries = state.retry_count(),
                            "run succeeded"
                        );
                        report.text = text;
                        report.succeeded = true;
                        Ok(report)
                    }
                    Err(SynthOutcome::Cancelled) => Err(cancelled()),
                    Err(SynthOutcome::Failed(error)) => {
                        counter!("relay_runs_total", "outcome" => "synthesis_error").increment(1);
                        counter!("relay_synthesis_errors_total").increment(1);
                        tracing::warn!(target: "relay::pipeline", error = %error, "synthesis failed, returning raw items");
                        report.text = degraded_listing(&req, self.settings.synthesis.max_items);
                        Err(PipelineError::Synthesis {
                            error,
                            degraded: Box::new(report),
                        })
                    }
                }
            }
        }
    }

    async fn synthesize(
        &self,
        req: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<String, SynthOutcome> {
        let timeout: Duration = self.settings.timeouts.synthesize();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthOutcome::Cancelled),
            r = tokio::time::timeout(timeout, self.synthesizer.synthesize(req)) => {
                r.unwrap_or(Err(SynthesisError::Timeout(timeout)))
                    .map_err(SynthOutcome::Failed)
            }
        }
    }
}

enum SynthOutcome {
    Cancelled,
    Failed(SynthesisError),
}

fn cancelled() -> PipelineError {
    counter!("relay_runs_total", "outcome" => "cancelled").increment(1);
    PipelineError::Cancelled
}
