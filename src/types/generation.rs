//! Generation settings.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Caller-supplied overrides for one generation call.
///
/// Unset fields fall back to the agent's provider configuration defaults.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}
