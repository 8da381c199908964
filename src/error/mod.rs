//! Error types for Agentry.

use thiserror::Error;

/// Primary error type for all Agentry operations.
#[derive(Error, Debug)]
pub enum AgentryError {
    /// Action name did not resolve and the agent declares no `prompt` fallback.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Agent class name not present in the registry (queued jobs).
    #[error("Agent not registered: {0}")]
    AgentNotRegistered(String),

    /// Named provider configuration missing or service unresolvable.
    /// Raised at agent definition time, never at invocation time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Stream error: {0}")]
    Stream(String),

    /// Attempt to defer a generation whose result was already observed.
    #[error("Generation already processed; cannot generate later")]
    AlreadyProcessed,

    /// A callback chain stopped before the unit of work ran.
    #[error("Generation halted by a {pipeline} callback")]
    Halted { pipeline: &'static str },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl AgentryError {
    /// Whether this error is worth retrying by an outer job framework.
    /// The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentryError>;
