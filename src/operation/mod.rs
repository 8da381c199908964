//! Tool operations executable from model output.
//!
//! A requested tool name originates from the model, so a miss is reported as
//! text rather than raised: it must never crash the pipeline.

use std::collections::HashMap;

use serde_json::{Map, Value};

type OperationFn = Box<dyn Fn(&Map<String, Value>) -> String + Send + Sync>;

/// Named operations an agent can perform as tool calls.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationFn>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn(&Map<String, Value>) -> String + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Box::new(body));
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operation names (sorted for stable output).
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute the named tool with the given arguments. Unknown names yield
    /// the literal "Tool not found" text.
    pub fn process_tool(&self, name: &str, arguments: &Map<String, Value>) -> String {
        match self.operations.get(name) {
            Some(operation) => operation(arguments),
            None => format!("Tool not found: {name}"),
        }
    }
}
