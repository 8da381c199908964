//! Core data types.

pub mod generation;
pub mod message;
pub mod response;

pub use generation::GenerationSettings;
pub use message::{Message, MessageAttributes, MessagePatch, PromptMessage, Role};
pub use response::ResponseEnvelope;
