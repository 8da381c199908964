//! Common re-exports.

pub use crate::agent::{AgentBuilder, AgentDefinition, AgentInstance, AgentRegistry};
pub use crate::callbacks::ChainOutcome;
pub use crate::config::{ProviderConfigTable, ProviderSettings};
pub use crate::error::{AgentryError, Result};
pub use crate::generation::{Generation, Runtime};
pub use crate::operation::OperationRegistry;
pub use crate::provider::{ChunkSink, GenerationProvider};
pub use crate::queue::{GenerationJob, InProcessQueue, JobDescriptor, JobQueue, ScheduleOptions};
pub use crate::storage::{InMemoryMessageStore, MessageStore, Notifier, TracingNotifier};
pub use crate::streaming::StreamingAccumulator;
pub use crate::types::{
    GenerationSettings, Message, MessageAttributes, MessagePatch, PromptMessage, ResponseEnvelope,
    Role,
};
