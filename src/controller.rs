//! # Retry/Fallback Controller
//! Explicit state machine driving collection attempts along the catalog's
//! fallback chains.
//!
//! `Routed → Attempting(s) → Succeeded | Retrying(next) → Attempting(next) | Exhausted`
//!
//! - Non-empty items end the run as `Succeeded`.
//! - Empty results and collector failures both trigger fallback.
//! - Candidates are `fallbacks_for(s)` minus every source already attempted;
//!   the first one in chain order wins.
//! - The run is `Exhausted` once `retry_count >= max_retries` or no candidate
//!   remains, so at most `max_retries + 1` attempts happen and no source is
//!   tried twice, even with cycles in the catalog.
//!
//! [`FallbackController::record`] is pure; [`FallbackController::drive`]
//! adds the one-fetch-per-attempt I/O loop on top of it.

use metrics::counter;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::catalog::{SourceCatalog, SourceId};
use crate::collect::Fetch;
use crate::error::{CollectorError, PipelineError, StateError};
use crate::item::CollectedItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success(Vec<CollectedItem>),
    Empty,
    Failed(String),
}

impl AttemptOutcome {
    /// An `Ok` with no items is `Empty`, not `Success`.
    pub fn from_fetch(res: Result<Vec<CollectedItem>, CollectorError>) -> Self {
        match res {
            Ok(items) if items.is_empty() => Self::Empty,
            Ok(items) => Self::Success(items),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub source: SourceId,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "source", rename_all = "snake_case")]
pub enum Phase {
    Routed,
    Attempting(SourceId),
    Succeeded,
    Exhausted,
}

/// What `record` decided after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Succeeded,
    Retrying(SourceId),
    Exhausted,
}

/// Transient per-query state. Only the controller mutates it; callers get
/// read-only accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    original_query: String,
    /// Terms actually sent to collectors (the router may refine them).
    search_query: String,
    attempts: Vec<AttemptRecord>,
    retry_count: u32,
    phase: Phase,
    final_source: Option<SourceId>,
    final_items: Vec<CollectedItem>,
}

impl PipelineState {
    pub fn new(original_query: impl Into<String>, search_query: impl Into<String>) -> Self {
        Self {
            original_query: original_query.into(),
            search_query: search_query.into(),
            attempts: Vec::new(),
            retry_count: 0,
            phase: Phase::Routed,
            final_source: None,
            final_items: Vec::new(),
        }
    }

    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Succeeded | Phase::Exhausted)
    }

    pub fn final_source(&self) -> Option<&SourceId> {
        self.final_source.as_ref()
    }

    pub fn final_items(&self) -> &[CollectedItem] {
        &self.final_items
    }

    /// Sources attempted so far, in order.
    pub fn trail(&self) -> Vec<SourceId> {
        self.attempts.iter().map(|a| a.source.clone()).collect()
    }

    fn was_attempted(&self, source: &SourceId) -> bool {
        self.attempts.iter().any(|a| &a.source == source)
    }
}

/// Shares only the read-only catalog; one controller can serve many runs.
#[derive(Debug, Clone, Copy)]
pub struct FallbackController<'a> {
    catalog: &'a SourceCatalog,
    max_retries: u32,
}

impl<'a> FallbackController<'a> {
    pub fn new(catalog: &'a SourceCatalog, max_retries: u32) -> Self {
        Self {
            catalog,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `Routed → Attempting(initial)`.
    pub fn begin(&self, state: &mut PipelineState, initial: SourceId) -> Result<(), StateError> {
        match state.phase {
            Phase::Routed => {
                state.phase = Phase::Attempting(initial);
                Ok(())
            }
            Phase::Attempting(_) => Err(StateError::NotStarted),
            Phase::Succeeded | Phase::Exhausted => Err(StateError::Terminal),
        }
    }

    /// Apply the outcome of the current attempt and decide the next phase.
    pub fn record(
        &self,
        state: &mut PipelineState,
        outcome: AttemptOutcome,
    ) -> Result<Transition, StateError> {
        let current = match &state.phase {
            Phase::Attempting(s) => s.clone(),
            Phase::Routed => return Err(StateError::NotStarted),
            Phase::Succeeded | Phase::Exhausted => return Err(StateError::Terminal),
        };

        // Normalize so an empty `Success` can never end the run.
        let outcome = match outcome {
            AttemptOutcome::Success(items) if items.is_empty() => AttemptOutcome::Empty,
            other => other,
        };

        counter!(
            "relay_attempts_total",
            "source" => current.to_string(),
            "outcome" => outcome.label()
        )
        .increment(1);

        if let AttemptOutcome::Success(items) = &outcome {
            state.final_source = Some(current.clone());
            state.final_items = items.clone();
            state.attempts.push(AttemptRecord {
                source: current,
                outcome,
            });
            state.phase = Phase::Succeeded;
            return Ok(Transition::Succeeded);
        }

        state.attempts.push(AttemptRecord {
            source: current.clone(),
            outcome,
        });

        let next = self
            .catalog
            .fallbacks_for(&current)
            .iter()
            .find(|s| !state.was_attempted(s))
            .cloned();

        match next {
            Some(next) if state.retry_count < self.max_retries => {
                state.retry_count += 1;
                counter!("relay_retries_total").increment(1);
                tracing::info!(
                    target: "relay::pipeline",
                    from = %current,
                    to = %next,
                    attempt = state.retry_count,
                    "retry with fallback source"
                );
                state.phase = Phase::Attempting(next.clone());
                Ok(Transition::Retrying(next))
            }
            _ => {
                tracing::warn!(
                    target: "relay::pipeline",
                    retries = state.retry_count,
                    trail = ?state.trail(),
                    "fallbacks exhausted"
                );
                state.phase = Phase::Exhausted;
                Ok(Transition::Exhausted)
            }
        }
    }

    /// Run a fixed outcome sequence through the machine. Outcomes past the
    /// terminal state are ignored. Pure: same inputs, same state.
    pub fn replay<I>(&self, query: &str, initial: SourceId, outcomes: I) -> PipelineState
    where
        I: IntoIterator<Item = AttemptOutcome>,
    {
        let mut state = PipelineState::new(query, query);
        if self.begin(&mut state, initial).is_err() {
            return state;
        }
        for outcome in outcomes {
            if state.is_terminal() || self.record(&mut state, outcome).is_err() {
                break;
            }
        }
        state
    }

    /// Drive a begun state to a terminal phase: one fetch per attempt,
    /// strictly sequential. A fetch timeout counts as a collector failure.
    /// Cancellation is observed at every suspension point.
    pub async fn drive(
        &self,
        state: &mut PipelineState,
        fetcher: &dyn Fetch,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        loop {
            let source = match &state.phase {
                Phase::Attempting(s) => s.clone(),
                Phase::Succeeded | Phase::Exhausted => return Ok(()),
                Phase::Routed => return Err(StateError::NotStarted.into()),
            };
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            tracing::debug!(target: "relay::collect", source = %source, query = %state.search_query, "attempt");
            let res = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                r = tokio::time::timeout(timeout, fetcher.fetch(&source, &state.search_query)) => {
                    r.unwrap_or(Err(CollectorError::Timeout(timeout)))
                }
            };

            self.record(state, AttemptOutcome::from_fetch(res))?;
        }
    }
}
