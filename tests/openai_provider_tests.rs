//! OpenAI provider tests against a mocked Chat Completions endpoint.

#![cfg(feature = "openai")]

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::RecordingNotifier;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agentry::agent::{AgentDefinition, AgentInstance};
use agentry::config::{ProviderConfigTable, ProviderSettings};
use agentry::error::{AgentryError, Result};
use agentry::generation::{Generation, Runtime};
use agentry::provider::openai::OpenAiProvider;
use agentry::provider::{ChunkSink, GenerationProvider};
use agentry::queue::InProcessQueue;
use agentry::storage::{InMemoryMessageStore, MessageStore};

fn settings_for(server: &MockServer) -> ProviderSettings {
    ProviderSettings::new("openai", "sk-test", "gpt-4o-mini").with_base_url(server.uri())
}

fn instance_with_content(content: &str) -> AgentInstance {
    let mut instance = AgentInstance::new(Default::default(), Default::default());
    instance.set_content(content);
    instance
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn generate_returns_the_completion_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [{ "role": "user", "content": "What is 6 * 7?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("42")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let envelope = provider
        .generate(&instance_with_content("What is 6 * 7?"))
        .await
        .unwrap();

    assert_eq!(envelope.content.as_deref(), Some("42"));
    assert!(!envelope.is_tool_call);
}

#[tokio::test]
async fn instructions_lead_the_request_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "Answer with a number." },
                { "role": "user", "content": "What is 6 * 7?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("42")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let mut instance = instance_with_content("What is 6 * 7?");
    instance.set_instructions("Answer with a number.");
    provider.generate(&instance).await.unwrap();
}

#[tokio::test]
async fn tool_call_response_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_inventory_items",
                            "arguments": "{\"query\":\"widget\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let envelope = provider
        .generate(&instance_with_content("find widgets"))
        .await
        .unwrap();

    assert!(envelope.is_tool_call);
    assert_eq!(envelope.tool_name.as_deref(), Some("search_inventory_items"));
    assert_eq!(envelope.tool_arguments["query"], json!("widget"));
}

#[tokio::test]
async fn unauthorized_maps_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "Invalid API key" } })),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let err = provider
        .generate(&instance_with_content("ping"))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentryError::Authentication(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn server_error_maps_to_retryable_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let err = provider
        .generate(&instance_with_content("ping"))
        .await
        .unwrap_err();

    match err {
        AgentryError::Api { status, ref message } => {
            assert_eq!(status, 500);
            assert!(message.contains("upstream exploded"));
        }
        other => panic!("expected Api error, got {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn rate_limit_carries_the_retry_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "error": { "message": "slow down", "retry_after": 2.0 } })),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let err = provider
        .generate(&instance_with_content("ping"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AgentryError::RateLimited {
            retry_after_ms: Some(2000)
        }
    ));
    assert!(err.is_retryable());
}

struct CollectingSink {
    chunks: Vec<(String, usize)>,
}

#[async_trait]
impl ChunkSink for CollectingSink {
    async fn on_chunk(&mut self, delta: &str, response_index: usize) -> Result<()> {
        self.chunks.push((delta.to_string(), response_index));
        Ok(())
    }
}

fn sse_chunk(index: usize, content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "choices": [{ "index": index, "delta": { "content": content } }] })
    )
}

#[tokio::test]
async fn stream_delivers_deltas_tagged_by_choice_index() {
    let server = MockServer::start().await;
    let body = [
        sse_chunk(0, "Hel"),
        sse_chunk(1, "First"),
        sse_chunk(0, "lo"),
        "data: {\"choices\":[{\"index\":0,\"delta\":{}}]}\n\n".to_string(),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true, "n": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(settings_for(&server));
    let mut instance = instance_with_content("sing");
    instance.stream = true;
    instance.fan_out = 2;

    let mut sink = CollectingSink { chunks: Vec::new() };
    provider.stream(&instance, &mut sink).await.unwrap();

    assert_eq!(
        sink.chunks,
        vec![
            ("Hel".to_string(), 0),
            ("First".to_string(), 1),
            ("lo".to_string(), 0),
        ]
    );
}

#[tokio::test]
async fn agent_pipeline_commits_the_mocked_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("42")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ProviderConfigTable::new();
    config.insert("openai", settings_for(&server));

    let agent = AgentDefinition::builder("calculator")
        .generate_with("openai", &config)
        .unwrap()
        .action("answer", |instance, _| {
            instance.set_content("What is 6 * 7?");
            Ok(())
        })
        .register()
        .unwrap();

    let store = Arc::new(InMemoryMessageStore::new());
    let runtime = Runtime::new(
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        Arc::new(InProcessQueue::new()),
    );

    let mut generation = Generation::new(agent, runtime, "answer", vec![]).with_context(
        HashMap::from([("chat_id".to_string(), json!("chat-http"))]),
    );

    assert_eq!(generation.content().await.unwrap(), "42");

    let committed = store.by_chat("chat-http").await.unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].content, "42");
}
