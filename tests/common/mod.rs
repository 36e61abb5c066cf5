// tests/common/mod.rs
//
// Scripted capabilities shared by the integration tests. Nothing here
// touches the network.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use research_relay::error::{ClassifyError, LlmError, SynthesisError};
use research_relay::{
    Classification, Classifier, CollectedItem, CollectorError, Fetch, Pipeline, PipelineSettings,
    SourceCatalog, SourceId, SynthesisRequest, Synthesizer,
};

#[derive(Clone, Debug)]
pub enum Script {
    Items(usize),
    Empty,
    Fail,
    Hang,
}

/// Fetch capability answering from a per-source script. Unscripted sources
/// behave like an unregistered collector.
#[derive(Default)]
pub struct ScriptedFetch {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<SourceId>>,
}

impl ScriptedFetch {
    pub fn new<'a>(scripts: impl IntoIterator<Item = (&'a str, Script)>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SourceId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn fetch(&self, source: &SourceId, query: &str) -> Result<Vec<CollectedItem>, CollectorError> {
        self.calls.lock().unwrap().push(source.clone());
        match self.scripts.get(source.as_str()) {
            Some(Script::Items(n)) => Ok((0..*n)
                .map(|i| {
                    CollectedItem::new(
                        source,
                        format!("{query} result {i}"),
                        format!("content {i} from {source}"),
                        format!("https://{source}.example/{i}"),
                    )
                })
                .collect()),
            Some(Script::Empty) => Ok(vec![]),
            Some(Script::Fail) => Err(CollectorError::Status(503)),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(CollectorError::UnknownSource(source.to_string())),
        }
    }
}

/// Classifier returning a fixed answer, counting calls and recording the
/// model override each call carried.
pub struct FixedClassifier {
    answer: Result<Classification, ()>,
    pub calls: AtomicUsize,
    pub models: Mutex<Vec<Option<String>>>,
}

impl FixedClassifier {
    pub fn source(source: &str) -> Self {
        Self {
            answer: Ok(Classification {
                source: source.to_string(),
                query: None,
            }),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn with_query(source: &str, query: &str) -> Self {
        Self {
            answer: Ok(Classification {
                source: source.to_string(),
                query: Some(query.to_string()),
            }),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(()),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(
        &self,
        _query: &str,
        _known: &BTreeSet<SourceId>,
        model: Option<&str>,
    ) -> Result<Classification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.map(str::to_string));
        self.answer
            .clone()
            .map_err(|_| ClassifyError::Llm(LlmError::Disabled))
    }
}

#[derive(Clone, Copy)]
pub enum SynthMode {
    Echo,
    Fail,
    Hang,
}

/// Synthesizer that echoes a summary line, fails, or never answers.
pub struct ScriptedSynth {
    mode: SynthMode,
    pub seen: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedSynth {
    pub fn new(mode: SynthMode) -> Self {
        Self {
            mode,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynth {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError> {
        self.seen.lock().unwrap().push(request.clone());
        match self.mode {
            SynthMode::Echo => Ok(format!(
                "summary of {} items from {}",
                request.items.len(),
                request.source
            )),
            SynthMode::Fail => Err(SynthesisError::Llm(LlmError::Status(500))),
            SynthMode::Hang => std::future::pending().await,
        }
    }
}

/// The seeded catalog used by the production binary.
pub fn seed_catalog() -> Arc<SourceCatalog> {
    Arc::new(SourceCatalog::default_seed())
}

pub fn pipeline(
    classifier: Arc<FixedClassifier>,
    fetch: Arc<ScriptedFetch>,
    synth: Arc<ScriptedSynth>,
    max_retries: u32,
) -> Pipeline {
    let settings = PipelineSettings {
        max_retries,
        ..PipelineSettings::default()
    };
    Pipeline::new(
        seed_catalog(),
        classifier,
        fetch,
        synth,
        SourceId::new("news"),
        settings,
    )
}
