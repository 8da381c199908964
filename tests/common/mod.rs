//! Shared test helpers and mock provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use agentry::agent::AgentInstance;
use agentry::error::Result;
use agentry::provider::{build_messages, ChunkSink, GenerationProvider};
use agentry::storage::Notifier;
use agentry::types::{Message, PromptMessage, ResponseEnvelope};

/// A mock provider that returns canned envelopes and scripted stream chunks,
/// capturing every request it sees.
pub struct MockProvider {
    model_id: String,
    envelopes: Mutex<VecDeque<ResponseEnvelope>>,
    chunks: Mutex<Vec<(String, usize)>>,
    pub requests: Mutex<Vec<Vec<PromptMessage>>>,
    pub calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            envelopes: Mutex::new(VecDeque::new()),
            chunks: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a text response.
    pub fn queue_response(&self, text: &str) {
        self.envelopes
            .lock()
            .unwrap()
            .push_back(ResponseEnvelope::text(text));
    }

    /// Queue a tool-call response.
    pub fn queue_tool_call(&self, name: &str, arguments: serde_json::Map<String, serde_json::Value>) {
        self.envelopes
            .lock()
            .unwrap()
            .push_back(ResponseEnvelope::tool_call(name, arguments));
    }

    /// Script the chunks the next streaming call will deliver, in order.
    pub fn script_chunks(&self, chunks: &[(&str, usize)]) {
        *self.chunks.lock().unwrap() = chunks
            .iter()
            .map(|(text, index)| (text.to_string(), *index))
            .collect();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Vec<PromptMessage>> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn service_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, instance: &AgentInstance) -> Result<ResponseEnvelope> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(build_messages(instance));
        Ok(self
            .envelopes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ResponseEnvelope::text("mock response")))
    }

    async fn stream(&self, instance: &AgentInstance, sink: &mut dyn ChunkSink) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(build_messages(instance));
        let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
        for (text, index) in chunks {
            sink.on_chunk(&text, index).await?;
        }
        Ok(())
    }
}

/// Provider that delivers some deltas and then drops the connection.
pub struct InterruptedStreamProvider {
    chunks: Vec<(String, usize)>,
}

impl InterruptedStreamProvider {
    pub fn new(chunks: &[(&str, usize)]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|(text, index)| (text.to_string(), *index))
                .collect(),
        }
    }
}

#[async_trait]
impl GenerationProvider for InterruptedStreamProvider {
    fn service_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "interrupted-model"
    }

    async fn generate(&self, _instance: &AgentInstance) -> Result<ResponseEnvelope> {
        Err(agentry::error::AgentryError::Stream(
            "connection reset".into(),
        ))
    }

    async fn stream(&self, _instance: &AgentInstance, sink: &mut dyn ChunkSink) -> Result<()> {
        for (text, index) in &self.chunks {
            sink.on_chunk(text, *index).await?;
        }
        Err(agentry::error::AgentryError::Stream(
            "connection reset".into(),
        ))
    }
}

/// Provider whose every call fails.
pub struct FailingProvider;

#[async_trait]
impl GenerationProvider for FailingProvider {
    fn service_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "failing-model"
    }

    async fn generate(&self, _instance: &AgentInstance) -> Result<ResponseEnvelope> {
        Err(agentry::error::AgentryError::Api {
            status: 500,
            message: "backend down".into(),
        })
    }

    async fn stream(&self, _instance: &AgentInstance, _sink: &mut dyn ChunkSink) -> Result<()> {
        Err(agentry::error::AgentryError::Api {
            status: 500,
            message: "backend down".into(),
        })
    }
}

/// Notifier that records every event for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: &'static str,
    pub response_number: usize,
    pub content: String,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_created(&self, message: &Message) {
        self.events.lock().unwrap().push(NotificationEvent {
            kind: "created",
            response_number: message.response_number,
            content: message.content.clone(),
        });
    }

    fn notify_updated(&self, message: &Message) {
        self.events.lock().unwrap().push(NotificationEvent {
            kind: "updated",
            response_number: message.response_number,
            content: message.content.clone(),
        });
    }
}
