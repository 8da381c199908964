//! OpenAI Chat Completions provider.

use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error};

use crate::agent::AgentInstance;
use crate::config::ProviderSettings;
use crate::error::Result;
use crate::types::ResponseEnvelope;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{build_messages, ChunkSink, GenerationProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    settings: ProviderSettings,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self { settings, base_url }
    }

    fn build_request_body(&self, instance: &AgentInstance, stream: bool) -> serde_json::Value {
        let model = instance
            .settings
            .model
            .clone()
            .unwrap_or_else(|| self.settings.model.clone());
        let temperature = instance
            .settings
            .temperature
            .unwrap_or(self.settings.temperature);
        let max_tokens = instance
            .settings
            .max_tokens
            .unwrap_or(self.settings.max_tokens);

        let mut body = serde_json::json!({
            "model": model,
            "messages": build_messages(instance),
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": stream,
        });

        if instance.fan_out > 1 {
            body.as_object_mut()
                .unwrap()
                .insert("n".into(), instance.fan_out.into());
        }

        body
    }

    async fn issue_request(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = match shared_client()
            .post(&url)
            .headers(bearer_headers(&self.settings.api_key))
            .json(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                error!(service = "openai", error = %err, "request failed");
                return Err(err.into());
            }
        };

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            let err = status_to_error(status, &body_text);
            error!(service = "openai", status, error = %err, "generation failed");
            return Err(err);
        }

        Ok(resp)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for OpenAiProvider {
    fn service_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, instance: &AgentInstance) -> Result<ResponseEnvelope> {
        let body = self.build_request_body(instance, false);
        debug!(model = %body["model"], "openai generate");

        let resp = self.issue_request(&body).await?;
        let payload: serde_json::Value = match resp.json().await {
            Ok(payload) => payload,
            Err(err) => {
                error!(service = "openai", error = %err, "unparseable response payload");
                return Err(err.into());
            }
        };

        Ok(ResponseEnvelope::from_chat_completion(&payload))
    }

    async fn stream(&self, instance: &AgentInstance, sink: &mut dyn ChunkSink) -> Result<()> {
        let body = self.build_request_body(instance, true);
        debug!(model = %body["model"], fan_out = instance.fan_out, "openai stream");

        let resp = self.issue_request(&body).await?;
        let mut byte_stream = resp.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(bytes) => bytes,
                Err(err) => {
                    error!(service = "openai", error = %err, "stream interrupted");
                    return Err(err.into());
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                let Some(data) = parse_sse_data(&line) else {
                    continue;
                };

                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(chunk) => {
                        for choice in chunk.choices {
                            if let Some(delta) = choice.delta.content {
                                sink.on_chunk(&delta, choice.index).await?;
                            }
                        }
                    }
                    Err(_) => {} // skip unparseable chunks
                }
            }
        }

        Ok(())
    }
}

// OpenAI streaming wire types (internal)

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    index: usize,
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
