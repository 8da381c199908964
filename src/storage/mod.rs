//! Persistence and notification collaborator contracts.
//!
//! The real backends live outside this crate; the core only relies on these
//! traits. The in-memory store exists for tests and embedded use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AgentryError, Result};
use crate::types::{Message, MessageAttributes, MessagePatch};

/// Persistence collaborator. Creation returns a stable identifier; updates
/// are applied in call order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, attributes: MessageAttributes) -> Result<Message>;
    async fn find(&self, id: Uuid) -> Result<Message>;
    async fn update(&self, id: Uuid, patch: MessagePatch) -> Result<Message>;
    /// Messages for one conversation, in creation order.
    async fn by_chat(&self, chat_id: &str) -> Result<Vec<Message>>;
}

/// Live-update collaborator. Fire-and-forget; the core only decides when to
/// notify, never how the notification travels.
pub trait Notifier: Send + Sync {
    fn notify_created(&self, message: &Message);
    fn notify_updated(&self, message: &Message);
}

/// Default notifier: logs at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_created(&self, message: &Message) {
        debug!(message_id = %message.id, chat_id = %message.chat_id, "message created");
    }

    fn notify_updated(&self, message: &Message) {
        debug!(
            message_id = %message.id,
            content_len = message.content.len(),
            "message updated"
        );
    }
}

/// In-memory message store.
#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    messages: HashMap<Uuid, Message>,
    creation_order: Vec<Uuid>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, attributes: MessageAttributes) -> Result<Message> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            chat_id: attributes.chat_id,
            role: attributes.role,
            content: attributes.content,
            response_number: attributes.response_number,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.lock().unwrap();
        inner.creation_order.push(message.id);
        inner.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find(&self, id: Uuid) -> Result<Message> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| AgentryError::Storage(format!("message not found: {id}")))
    }

    async fn update(&self, id: Uuid, patch: MessagePatch) -> Result<Message> {
        let mut inner = self.inner.lock().unwrap();
        let message = inner
            .messages
            .get_mut(&id)
            .ok_or_else(|| AgentryError::Storage(format!("message not found: {id}")))?;
        if let Some(content) = patch.content {
            message.content = content;
        }
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn by_chat(&self, chat_id: &str) -> Result<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .creation_order
            .iter()
            .filter_map(|id| inner.messages.get(id))
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }
}
