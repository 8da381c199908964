//! Generation provider trait and implementations.

pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

use async_trait::async_trait;

use crate::agent::AgentInstance;
use crate::config::ProviderSettings;
use crate::error::{AgentryError, Result};
use crate::types::{PromptMessage, ResponseEnvelope};

/// Receives streamed deltas as they arrive. The only streaming boundary in
/// the system; implementations must tolerate repeated calls from within the
/// provider's request loop.
#[async_trait]
pub trait ChunkSink: Send {
    async fn on_chunk(&mut self, delta: &str, response_index: usize) -> Result<()>;
}

/// Capability interface implemented per generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Service name (e.g. "openai").
    fn service_name(&self) -> &str;

    /// The configured model identifier.
    fn model_id(&self) -> &str;

    /// Blocking generation. Returns the normalized envelope; a requested
    /// tool call is parsed but never executed here.
    async fn generate(&self, instance: &AgentInstance) -> Result<ResponseEnvelope>;

    /// Streaming generation. Deltas are delivered to `sink` in arrival
    /// order, tagged with their candidate response index.
    async fn stream(&self, instance: &AgentInstance, sink: &mut dyn ChunkSink) -> Result<()>;
}

impl std::fmt::Debug for dyn GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationProvider")
            .field("service", &self.service_name())
            .field("model", &self.model_id())
            .finish()
    }
}

/// Build the prompt message list for one invocation: system instructions
/// first when present, then prior context messages, then the new user
/// content.
pub fn build_messages(instance: &AgentInstance) -> Vec<PromptMessage> {
    let mut messages = Vec::new();
    if let Some(ref instructions) = instance.instructions {
        messages.push(PromptMessage::system(instructions.clone()));
    }
    messages.extend(instance.prior_messages.iter().cloned());
    if !instance.content.is_empty() {
        messages.push(PromptMessage::user(instance.content.clone()));
    }
    messages
}

/// Construct the provider for a resolved configuration entry.
///
/// An unresolvable service name is a configuration error, surfaced at agent
/// definition time.
#[allow(unused_variables)]
pub fn create_provider(settings: &ProviderSettings) -> Result<std::sync::Arc<dyn GenerationProvider>> {
    match settings.service.as_str() {
        #[cfg(feature = "openai")]
        "openai" => Ok(std::sync::Arc::new(openai::OpenAiProvider::new(
            settings.clone(),
        ))),
        other => Err(AgentryError::Configuration(format!(
            "no generation provider for service '{other}'"
        ))),
    }
}
