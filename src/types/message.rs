//! Message records and wire-facing prompt entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A persisted turn in a conversation.
///
/// Created with empty content before generation produces anything, mutated by
/// the streaming accumulator as deltas arrive, finalized once generation
/// completes. Never deleted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    /// Disambiguates parallel candidate responses for one prompt.
    pub response_number: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes for creating a message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAttributes {
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub response_number: usize,
}

impl MessageAttributes {
    /// An empty assistant message, the pre-created target of streamed deltas.
    pub fn empty_assistant(chat_id: impl Into<String>, response_number: usize) -> Self {
        Self {
            chat_id: chat_id.into(),
            role: Role::Assistant,
            content: String::new(),
            response_number,
        }
    }
}

/// Partial update applied to an existing message record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    pub content: Option<String>,
}

impl MessagePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

/// A prompt entry as sent to a generation provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for PromptMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}
