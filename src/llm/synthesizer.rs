use async_trait::async_trait;

use super::{ChatMessage, DynChatBackend};
use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::outcome::{SynthesisRequest, Synthesizer};

/// Briefing writer backed by the (larger) analysis model.
pub struct LlmSynthesizer {
    backend: DynChatBackend,
    model: String,
    limits: SynthesisConfig,
}

impl LlmSynthesizer {
    pub fn new(backend: DynChatBackend, model: impl Into<String>, limits: SynthesisConfig) -> Self {
        Self {
            backend,
            model: model.into(),
            limits,
        }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError> {
        let messages = [ChatMessage::user(build_prompt(request, &self.limits))];
        let model = request.model.as_deref().unwrap_or(&self.model);
        tracing::debug!(
            target: "relay::pipeline",
            backend = self.backend.name(),
            model = %model,
            items = request.items.len(),
            "synthesis request"
        );
        Ok(self.backend.complete(&messages, model, 0.4).await?)
    }

    fn default_model(&self) -> Option<&str> {
        Some(&self.model)
    }
}

fn build_prompt(req: &SynthesisRequest, limits: &SynthesisConfig) -> String {
    let mut data = String::new();
    for (i, item) in req.items.iter().take(limits.max_items).enumerate() {
        let content: String = item.content.chars().take(limits.max_content_chars).collect();
        data.push_str(&format!("\n--- Item {} ---\n", i + 1));
        data.push_str(&format!("Title: {}\n", item.title));
        data.push_str(&format!("Content: {content}\n"));
        if let Some(ts) = item.published_at {
            data.push_str(&format!("Published: {}\n", ts.format("%Y-%m-%d")));
        }
        if !item.url.is_empty() {
            data.push_str(&format!("URL: {}\n", item.url));
        }
    }

    format!(
        "You are a research analyst. Synthesize these {} results for the query '{}' into a well-structured briefing.\n\n\
         FORMAT RULES (Telegram Markdown):\n\
         - Use *bold* for emphasis (NOT **bold**)\n\
         - Use _italic_ for secondary info\n\
         - Use `code` for tickers, numbers, or technical terms\n\
         - Use bullet points (•) for lists\n\
         - Include clickable links as: [Title](url)\n\
         - Start with a 1-2 sentence *Key Takeaway*\n\
         - Then list *Highlights* as bullet points\n\
         - End with a *Sources* section linking the URLs\n\
         - Keep it under 3000 characters total\n\
         - Do NOT use headers with #\n\n\
         DATA:\n{data}",
        req.source, req.search_query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceId;
    use crate::item::CollectedItem;
    use crate::llm::{DisabledBackend, MockBackend};
    use std::sync::Arc;

    fn request(n: usize) -> SynthesisRequest {
        let src = SourceId::new("news");
        SynthesisRequest {
            query: "what happened in rust".into(),
            search_query: "rust".into(),
            source: src.clone(),
            items: (0..n)
                .map(|i| CollectedItem::new(&src, format!("T{i}"), "x".repeat(800), format!("https://n/{i}")))
                .collect(),
            model: None,
        }
    }

    #[test]
    fn prompt_caps_items_and_content() {
        let p = build_prompt(&request(7), &SynthesisConfig::default());
        assert!(p.contains("--- Item 5 ---"));
        assert!(!p.contains("--- Item 6 ---"));
        assert!(p.contains(&format!("Content: {}\n", "x".repeat(500))));
        assert!(!p.contains(&"x".repeat(501)));
        assert!(p.contains("Synthesize these news results for the query 'rust'"));
    }

    #[tokio::test]
    async fn backend_reply_passes_through() {
        let s = LlmSynthesizer::new(
            Arc::new(MockBackend::new("*Key Takeaway* ok")),
            "big",
            SynthesisConfig::default(),
        );
        assert_eq!(s.synthesize(&request(1)).await.unwrap(), "*Key Takeaway* ok");
    }

    #[tokio::test]
    async fn disabled_backend_is_a_synthesis_error() {
        let s = LlmSynthesizer::new(Arc::new(DisabledBackend), "big", SynthesisConfig::default());
        assert!(matches!(
            s.synthesize(&request(1)).await,
            Err(SynthesisError::Llm(_))
        ));
    }
}
