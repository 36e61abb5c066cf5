use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;

use super::{ChatMessage, DynChatBackend};
use crate::catalog::SourceId;
use crate::error::ClassifyError;
use crate::routing::{Classification, Classifier};

/// Router backed by a small, fast chat model. Asks for
/// `{"source": "...", "query": "..."}` and tolerates code fences.
pub struct LlmClassifier {
    backend: DynChatBackend,
    model: String,
}

impl LlmClassifier {
    pub fn new(backend: DynChatBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(
        &self,
        query: &str,
        known: &BTreeSet<SourceId>,
        model: Option<&str>,
    ) -> Result<Classification, ClassifyError> {
        let messages = build_messages(query, known);
        let model = model.unwrap_or(&self.model);
        let text = self.backend.complete(&messages, model, 0.1).await?;
        parse_reply(&text)
    }
}

pub(crate) const ROUTER_PREAMBLE: &str = "You are a router.";

fn build_messages(query: &str, known: &BTreeSet<SourceId>) -> [ChatMessage; 2] {
    let sources: Vec<&str> = known.iter().map(SourceId::as_str).collect();
    let system = format!(
        "{ROUTER_PREAMBLE} Given the user message, pick the best data source and extract the search query.\n\
         Available sources: {}\n\n\
         Respond with ONLY valid JSON: {{\"source\": \"...\", \"query\": \"...\"}}",
        sources.join(", ")
    );
    [ChatMessage::system(system), ChatMessage::user(query)]
}

pub(crate) fn parse_reply(text: &str) -> Result<Classification, ClassifyError> {
    #[derive(Deserialize)]
    struct Reply {
        source: String,
        #[serde(default)]
        query: Option<String>,
    }

    let json = extract_json(text);
    let reply: Reply =
        serde_json::from_str(json).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    if reply.source.trim().is_empty() {
        return Err(ClassifyError::Malformed("empty source".to_string()));
    }
    Ok(Classification {
        source: reply.source,
        query: reply.query,
    })
}

/// Strip ```json fences and any prose around the first JSON object.
fn extract_json(text: &str) -> &str {
    let t = text.trim();
    match (t.find('{'), t.rfind('}')) {
        (Some(start), Some(end)) if end > start => &t[start..=end],
        _ => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockBackend;
    use std::sync::Arc;

    #[test]
    fn parses_plain_and_fenced_json() {
        let c = parse_reply(r#"{"source": "arxiv", "query": "llm agents"}"#).unwrap();
        assert_eq!(c.source, "arxiv");
        assert_eq!(c.query.as_deref(), Some("llm agents"));

        let fenced = "```json\n{\"source\": \"github\"}\n```";
        let c = parse_reply(fenced).unwrap();
        assert_eq!(c.source, "github");
        assert!(c.query.is_none());
    }

    #[test]
    fn rejects_prose_and_blank_source() {
        assert!(matches!(
            parse_reply("I think news is best"),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"source": " "}"#),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn system_prompt_lists_known_sources() {
        let known: BTreeSet<SourceId> = ["news", "arxiv"].into_iter().map(SourceId::new).collect();
        let [system, user] = build_messages("papers on RAG", &known);
        assert_eq!(system.role, "system");
        assert!(system.content.starts_with(ROUTER_PREAMBLE));
        assert!(system.content.contains("Available sources: arxiv, news"));
        assert_eq!(user, ChatMessage::user("papers on RAG"));
    }

    #[tokio::test]
    async fn classifies_through_backend() {
        let backend = Arc::new(MockBackend::new(r#"{"source":"reddit","query":"rust"}"#));
        let c = LlmClassifier::new(backend, "m");
        let out = c.classify("what does reddit say about rust", &BTreeSet::new(), None).await.unwrap();
        assert_eq!(out.source, "reddit");
    }
}
