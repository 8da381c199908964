//! Registry mapping agent class names to definitions.
//!
//! Queued jobs carry an agent class name; the external runner resolves it
//! here before re-entering the dispatch pipeline.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{AgentryError, Result};

use super::AgentDefinition;

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<AgentDefinition>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its own name.
    pub fn register(&self, definition: Arc<AgentDefinition>) {
        self.agents
            .write()
            .unwrap()
            .insert(definition.name().to_string(), definition);
    }

    pub fn get(&self, name: &str) -> Result<Arc<AgentDefinition>> {
        self.agents
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AgentryError::AgentNotRegistered(name.to_string()))
    }

    pub fn has_agent(&self, name: &str) -> bool {
        self.agents.read().unwrap().contains_key(name)
    }

    /// List registered agent names.
    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().unwrap().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
