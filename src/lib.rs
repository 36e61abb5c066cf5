// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod collect;
pub mod config;
pub mod controller;
pub mod error;
pub mod item;
pub mod llm;
pub mod metrics;
pub mod outcome;
pub mod pipeline;
pub mod respond;
pub mod routing;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState, LlmInfo};
pub use crate::catalog::{SourceCatalog, SourceId};
pub use crate::collect::{Collector, CollectorRegistry, Fetch};
pub use crate::config::RelayConfig;
pub use crate::error::{CollectorError, PipelineError};
pub use crate::item::CollectedItem;
pub use crate::outcome::{SynthesisRequest, Synthesizer};
pub use crate::pipeline::{Pipeline, PipelineSettings, RunOptions, RunReport};
pub use crate::routing::{Classification, Classifier};

use std::sync::Arc;

use crate::llm::{build_backend, LlmClassifier, LlmSynthesizer};

/// Wire registry, catalog, LLM backends and pipeline from a loaded config.
/// The catalog learns every registered collector id so routing accepts them
/// even when they have no fallback chain of their own.
pub fn build_state(cfg: &RelayConfig, catalog: SourceCatalog) -> AppState {
    let registry = Arc::new(CollectorRegistry::with_defaults(cfg.collect_limit));
    let catalog = Arc::new(catalog.with_known(registry.ids().cloned().collect::<Vec<_>>()));

    let llm = cfg.llm.clone().resolve();
    let backend = build_backend(&llm);
    tracing::info!(
        backend = backend.name(),
        model = %llm.model,
        synthesis_model = %llm.synthesis_model(),
        "llm backend ready"
    );

    let classifier = Arc::new(LlmClassifier::new(backend.clone(), llm.model.clone()));
    let synthesizer = Arc::new(LlmSynthesizer::new(
        backend,
        llm.synthesis_model(),
        cfg.synthesis,
    ));

    let pipeline = Pipeline::new(
        catalog,
        classifier,
        registry.clone(),
        synthesizer,
        SourceId::new(&cfg.default_source),
        PipelineSettings::from(cfg),
    );

    AppState {
        pipeline: Arc::new(pipeline),
        registry,
        llm: LlmInfo::from(&llm),
    }
}
