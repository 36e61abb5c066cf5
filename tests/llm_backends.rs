// tests/llm_backends.rs
//
// Chat backends against wiremock: request shape, reply extraction and
// error mapping. The classifier is driven end-to-end through one of them.

use std::collections::BTreeSet;
use std::sync::Arc;

use research_relay::error::LlmError;
use research_relay::llm::{ChatBackend, ChatMessage, LlmClassifier, OllamaBackend, OpenAiCompatBackend};
use research_relay::{Classifier, SourceId};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
}

#[tokio::test]
async fn openai_compat_posts_bearer_and_reads_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer k-123"))
        .and(body_partial_json(json!({ "model": "tiny" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  hello  ")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiCompatBackend::new("openrouter", server.uri(), "k-123".into());
    let out = backend
        .complete(&[ChatMessage::user("hi")], "tiny", 0.1)
        .await
        .unwrap();
    assert_eq!(out, "hello");
}

#[tokio::test]
async fn upstream_status_and_blank_reply_are_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "busy" })))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "quiet" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let backend = OpenAiCompatBackend::new("openai", server.uri(), "k".into());
    let msgs = [ChatMessage::user("hi")];
    assert!(matches!(
        backend.complete(&msgs, "busy", 0.1).await,
        Err(LlmError::Status(429))
    ));
    assert!(matches!(
        backend.complete(&msgs, "quiet", 0.1).await,
        Err(LlmError::Empty)
    ));
}

#[tokio::test]
async fn ollama_disables_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "llama3.1:8b", "stream": false })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": { "role": "assistant", "content": "ok" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(server.uri());
    let out = backend
        .complete(&[ChatMessage::user("hi")], "llama3.1:8b", 0.1)
        .await
        .unwrap();
    assert_eq!(out, "ok");
}

#[tokio::test]
async fn classifier_reads_fenced_json_from_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"source\": \"arxiv\", \"query\": \"diffusion models\"}\n```",
        )))
        .mount(&server)
        .await;

    let backend = Arc::new(OpenAiCompatBackend::new("openrouter", server.uri(), "k".into()));
    let classifier = LlmClassifier::new(backend, "tiny");
    let known: BTreeSet<SourceId> = ["arxiv", "news"].into_iter().map(SourceId::new).collect();

    let c = classifier
        .classify("any new papers on diffusion models?", &known, None)
        .await
        .unwrap();
    assert_eq!(c.source, "arxiv");
    assert_eq!(c.query.as_deref(), Some("diffusion models"));
}

#[tokio::test]
async fn classifier_sends_system_prompt_and_honours_model_override() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "qwen2.5:3b",
            "messages": [ { "role": "system" }, { "role": "user", "content": "rust jobs" } ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"source": "reddit"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(OpenAiCompatBackend::new("openrouter", server.uri(), "k".into()));
    let classifier = LlmClassifier::new(backend, "configured-model");
    let known: BTreeSet<SourceId> = ["reddit"].into_iter().map(SourceId::new).collect();

    let c = classifier
        .classify("rust jobs", &known, Some("qwen2.5:3b"))
        .await
        .unwrap();
    assert_eq!(c.source, "reddit");
}
