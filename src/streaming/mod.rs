//! Streaming accumulator: turns deltas into persisted message updates.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AgentryError, Result};
use crate::provider::ChunkSink;
use crate::storage::{MessageStore, Notifier};
use crate::types::{Message, MessageAttributes, MessagePatch};

/// Accumulates streamed deltas into pre-created message records, one per
/// candidate response index.
///
/// All target messages are created empty, and announced, before the first
/// delta can arrive. Updates for one index are applied in delivery order;
/// nothing is assumed about ordering across indices. Already-committed
/// partial content survives a mid-stream failure.
pub struct StreamingAccumulator {
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn Notifier>,
    messages: Vec<Message>,
}

impl StreamingAccumulator {
    /// Pre-create `fan_out` empty assistant messages with response numbers
    /// `0..fan_out`, emitting a creation notification for each.
    pub async fn prepare(
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
        chat_id: &str,
        fan_out: usize,
    ) -> Result<Self> {
        let count = fan_out.max(1);
        let mut messages = Vec::with_capacity(count);
        for response_number in 0..count {
            let message = store
                .create(MessageAttributes::empty_assistant(chat_id, response_number))
                .await?;
            notifier.notify_created(&message);
            messages.push(message);
        }
        debug!(chat_id, fan_out = count, "streaming targets created");
        Ok(Self {
            store,
            notifier,
            messages,
        })
    }

    pub fn message(&self, response_index: usize) -> Option<&Message> {
        self.messages.get(response_index)
    }

    /// Hand the accumulated messages over, in response-number order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[async_trait]
impl ChunkSink for StreamingAccumulator {
    async fn on_chunk(&mut self, delta: &str, response_index: usize) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let fan_out = self.messages.len();
        let slot = self.messages.get_mut(response_index).ok_or_else(|| {
            AgentryError::Stream(format!(
                "delta for response index {response_index} outside fan-out {fan_out}"
            ))
        })?;
        slot.content.push_str(delta);
        *slot = self
            .store
            .update(slot.id, MessagePatch::content(slot.content.clone()))
            .await?;
        self.notifier.notify_updated(slot);
        Ok(())
    }
}
