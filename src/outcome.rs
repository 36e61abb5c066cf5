//! # Outcome Assembler
//! Converts a terminal [`PipelineState`] into either a synthesis request
//! or a deterministic failure narrative. Exhausted runs never reach the
//! synthesis capability.

use async_trait::async_trait;
use serde::Serialize;

use crate::aggregate::{merge, SourceStatus};
use crate::catalog::SourceId;
use crate::controller::{Phase, PipelineState};
use crate::error::{StateError, SynthesisError};
use crate::item::CollectedItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisRequest {
    pub query: String,
    pub search_query: String,
    pub source: SourceId,
    pub items: Vec<CollectedItem>,
    /// Per-run override of the synthesizer's configured model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Opaque synthesis capability (an LLM call in production).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError>;

    /// Model used when a request carries no override, if the capability has one.
    fn default_model(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureNarrative {
    pub trail: Vec<SourceId>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    Synthesize(SynthesisRequest),
    Narrative(FailureNarrative),
}

pub fn assemble(state: &PipelineState) -> Result<Assembly, StateError> {
    match state.phase() {
        Phase::Succeeded => {
            let source = state
                .final_source()
                .cloned()
                .ok_or(StateError::NotTerminal)?;
            Ok(Assembly::Synthesize(SynthesisRequest {
                query: state.original_query().to_string(),
                search_query: state.search_query().to_string(),
                source,
                items: state.final_items().to_vec(),
                model: None,
            }))
        }
        Phase::Exhausted => Ok(Assembly::Narrative(narrate(state))),
        Phase::Routed | Phase::Attempting(_) => Err(StateError::NotTerminal),
    }
}

fn narrate(state: &PipelineState) -> FailureNarrative {
    let agg = merge(state.attempts());
    let names: Vec<&str> = agg.trail.iter().map(SourceId::as_str).collect();

    let mut text = format!(
        "Tried {} but found no results for '{}'.",
        join_human(&names),
        state.original_query()
    );
    for r in &agg.sources {
        let what = match r.status {
            SourceStatus::Unavailable(_) => "source unavailable",
            SourceStatus::NoResults | SourceStatus::Results(_) => "no results",
        };
        text.push_str(&format!("\n- {}: {what}", r.source));
    }

    FailureNarrative {
        trail: agg.trail,
        text,
    }
}

/// "a", "a and b", "a, b and c"
fn join_human(names: &[&str]) -> String {
    match names {
        [] => "no sources".to_string(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Unsynthesized listing returned when the synthesis call fails.
pub fn degraded_listing(request: &SynthesisRequest, max_items: usize) -> String {
    let mut out = format!(
        "*{} results for '{}'*\n\n",
        request.source.as_str().to_uppercase(),
        request.search_query
    );
    for it in request.items.iter().take(max_items) {
        out.push_str(&format!("• *{}*\n", it.title));
        if !it.url.is_empty() {
            let label: String = it.title.chars().take(40).collect();
            out.push_str(&format!("  [{label}]({})\n", it.url));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceCatalog;
    use crate::controller::{AttemptOutcome, FallbackController};

    fn id(s: &str) -> SourceId {
        SourceId::new(s)
    }

    #[test]
    fn success_builds_synthesis_request() {
        let cat = SourceCatalog::new([("a", vec!["b"])]);
        let ctl = FallbackController::new(&cat, 2);
        let items = vec![CollectedItem::new(&id("b"), "T", "C", "https://u")];
        let st = ctl.replay(
            "what's new",
            id("a"),
            [AttemptOutcome::Empty, AttemptOutcome::Success(items.clone())],
        );
        match assemble(&st).unwrap() {
            Assembly::Synthesize(req) => {
                assert_eq!(req.source, id("b"));
                assert_eq!(req.items, items);
                assert_eq!(req.query, "what's new");
            }
            other => panic!("expected synthesis, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_narrative_lists_trail_and_distinguishes_failures() {
        let cat = SourceCatalog::new([("news", vec!["wikipedia", "reddit"]), ("wikipedia", vec!["reddit"])]);
        let ctl = FallbackController::new(&cat, 2);
        let st = ctl.replay(
            "quantum",
            id("news"),
            [
                AttemptOutcome::Empty,
                AttemptOutcome::Failed("status 503".into()),
                AttemptOutcome::Empty,
            ],
        );
        let Assembly::Narrative(n) = assemble(&st).unwrap() else {
            panic!("expected narrative");
        };
        assert_eq!(n.trail, vec![id("news"), id("wikipedia"), id("reddit")]);
        assert_eq!(
            n.text,
            "Tried news, wikipedia and reddit but found no results for 'quantum'.\n\
             - news: no results\n\
             - wikipedia: source unavailable\n\
             - reddit: no results"
        );
    }

    #[test]
    fn non_terminal_state_is_rejected() {
        let st = PipelineState::new("q", "q");
        assert_eq!(assemble(&st), Err(StateError::NotTerminal));
    }

    #[test]
    fn degraded_listing_links_items() {
        let req = SynthesisRequest {
            query: "q".into(),
            search_query: "rust".into(),
            source: id("news"),
            items: vec![
                CollectedItem::new(&id("news"), "Rust 1.90", "", "https://n/1"),
                CollectedItem::new(&id("news"), "No link", "", ""),
            ],
            model: None,
        };
        let s = degraded_listing(&req, 5);
        assert!(s.starts_with("*NEWS results for 'rust'*"));
        assert!(s.contains("[Rust 1.90](https://n/1)"));
        assert!(s.contains("• *No link*\n"));
    }
}
