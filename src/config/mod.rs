//! Named provider configuration.
//!
//! A table keyed by service name resolves to an immutable [`ProviderSettings`]
//! at agent definition time. Missing keys fail the definition, not the
//! invocation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AgentryError, Result};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// One resolved provider configuration entry. Read-only after resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSettings {
    pub service: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Override for self-hosted or proxied endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl ProviderSettings {
    pub fn new(
        service: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Configuration table keyed by provider/service name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfigTable {
    #[serde(flatten)]
    entries: HashMap<String, ProviderSettings>,
}

impl ProviderConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, settings: ProviderSettings) {
        self.entries.insert(name.into(), settings);
    }

    /// Resolve a named entry. A missing key is a configuration error.
    pub fn get(&self, name: &str) -> Result<&ProviderSettings> {
        self.entries.get(name).ok_or_else(|| {
            AgentryError::Configuration(format!("no provider configuration named '{name}'"))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Parse a TOML table of named provider entries.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|err| AgentryError::Configuration(format!("invalid provider config: {err}")))
    }

    /// Build a table from environment variables (loading `.env` if present).
    ///
    /// `OPENAI_API_KEY` seeds an `"openai"` entry; `AGENTRY_OPENAI_MODEL` and
    /// `OPENAI_BASE_URL` override its model and endpoint.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut table = Self::new();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            let model = std::env::var("AGENTRY_OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string());
            let mut settings = ProviderSettings::new("openai", api_key, model);
            if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
                settings.base_url = Some(url);
            }
            table.insert("openai", settings);
        }

        table
    }
}
