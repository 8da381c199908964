//! Response adapter: normalizes raw provider payloads.

use serde_json::{Map, Value};
use tracing::warn;

/// The normalized result of one generation call.
///
/// Derived from the raw provider payload; never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub content: Option<String>,
    pub is_tool_call: bool,
    pub tool_name: Option<String>,
    pub tool_arguments: Map<String, Value>,
}

impl ResponseEnvelope {
    /// A plain text envelope with no tool call.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_tool_call: false,
            tool_name: None,
            tool_arguments: Map::new(),
        }
    }

    /// A tool-call envelope.
    pub fn tool_call(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            content: None,
            is_tool_call: true,
            tool_name: Some(name.into()),
            tool_arguments: arguments,
        }
    }

    /// Normalize a chat-completions payload.
    ///
    /// Reads `choices[0].message.content` and, when present, the first entry
    /// of `choices[0].message.tool_calls` with its JSON-encoded arguments.
    /// Malformed tool arguments degrade to an empty mapping rather than
    /// failing the whole response.
    pub fn from_chat_completion(payload: &Value) -> Self {
        let message = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"));

        let content = message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let tool_call = message
            .and_then(|m| m.get("tool_calls"))
            .and_then(|tc| tc.get(0));

        match tool_call {
            Some(call) => {
                let name = call
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let raw_arguments = call
                    .get("function")
                    .and_then(|f| f.get("arguments"))
                    .and_then(Value::as_str)
                    .unwrap_or("{}");
                let arguments = match serde_json::from_str::<Map<String, Value>>(raw_arguments) {
                    Ok(map) => map,
                    Err(err) => {
                        warn!(error = %err, "unparseable tool arguments, using empty mapping");
                        Map::new()
                    }
                };
                Self {
                    content,
                    is_tool_call: true,
                    tool_name: name,
                    tool_arguments: arguments,
                }
            }
            None => Self {
                content,
                is_tool_call: false,
                tool_name: None,
                tool_arguments: Map::new(),
            },
        }
    }
}
