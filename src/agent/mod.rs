//! Agent definitions and per-invocation instances.

pub mod dispatch;
pub mod registry;

pub use registry::AgentRegistry;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::callbacks::{self, CallbackRegistry, ChainOutcome, Next};
use crate::config::{ProviderConfigTable, ProviderSettings};
use crate::error::{AgentryError, Result};
use crate::operation::OperationRegistry;
use crate::provider::{create_provider, GenerationProvider};
use crate::types::{GenerationSettings, Message, PromptMessage, ResponseEnvelope};

use futures::future::BoxFuture;

/// Context key carrying the conversation correlation id.
pub const CONTEXT_CHAT_ID: &str = "chat_id";

/// Action name used as the fallback when resolution misses the declared set.
pub const FALLBACK_ACTION: &str = "prompt";

const DEFAULT_QUEUE_NAME: &str = "agents";

/// An action body: builds prompt content on the instance from its arguments.
pub type ActionFn = Box<dyn ActionBody>;

/// Callable bound behind [`ActionFn`]; blanket-implemented for any closure
/// with the matching signature.
pub trait ActionBody: Fn(&mut AgentInstance, &[Value]) -> Result<()> + Send + Sync {}

impl<F> ActionBody for F where F: Fn(&mut AgentInstance, &[Value]) -> Result<()> + Send + Sync {}

impl std::fmt::Debug for dyn ActionBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActionFn")
    }
}

type ExceptionHandler = Box<dyn Fn(&AgentryError) + Send + Sync>;

/// One invocation's working state.
///
/// Created by the dispatcher, mutated by the action body and callback hooks,
/// and destroyed once the generation proxy captures its result.
#[derive(Debug)]
pub struct AgentInstance {
    /// Caller-supplied parameters.
    pub params: HashMap<String, Value>,
    /// Correlation data, e.g. the conversation identifier.
    pub context: HashMap<String, Value>,
    /// The prompt body sent as the user message.
    pub content: String,
    /// System instructions, sent first when present.
    pub instructions: Option<String>,
    /// Prior conversation turns included before the new content.
    pub prior_messages: Vec<PromptMessage>,
    /// Per-call overrides of the configured generation defaults.
    pub settings: GenerationSettings,
    /// Stream the response instead of blocking for it.
    pub stream: bool,
    /// Number of parallel candidate responses to request.
    pub fan_out: usize,
    /// The resulting message, owned here until handed to the caller.
    pub message: Option<Message>,
    /// The normalized provider output.
    pub response: Option<ResponseEnvelope>,
    /// Output of a tool executed by the after-generate hook.
    pub tool_output: Option<String>,
}

impl Default for AgentInstance {
    fn default() -> Self {
        Self {
            params: HashMap::new(),
            context: HashMap::new(),
            content: String::new(),
            instructions: None,
            prior_messages: Vec::new(),
            settings: GenerationSettings::default(),
            stream: false,
            // One candidate, never zero.
            fan_out: 1,
            message: None,
            response: None,
            tool_output: None,
        }
    }
}

impl AgentInstance {
    pub fn new(params: HashMap<String, Value>, context: HashMap<String, Value>) -> Self {
        Self {
            params,
            context,
            ..Default::default()
        }
    }

    /// The conversation id from context, if any.
    pub fn chat_id(&self) -> Option<String> {
        match self.context.get(CONTEXT_CHAT_ID) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }

    /// Convenience accessor for a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.instructions = Some(instructions.into());
    }
}

/// A named, configured unit of behavior. Immutable after [`AgentBuilder::register`].
pub struct AgentDefinition {
    name: String,
    provider: Arc<dyn GenerationProvider>,
    settings: ProviderSettings,
    instructions_action: Option<String>,
    actions: HashMap<String, ActionFn>,
    callbacks: CallbackRegistry,
    operations: Arc<OperationRegistry>,
    exception_handler: Option<ExceptionHandler>,
    queue_name: String,
}

impl std::fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}

impl AgentDefinition {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }

    pub fn provider_settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    pub fn instructions_action(&self) -> Option<&str> {
        self.instructions_action.as_deref()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Declared action names (sorted for stable output).
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub(crate) fn action(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(name)
    }

    /// Route a failure from a queued invocation. Falls back to logging when
    /// the agent declares no handler.
    pub fn handle_exception(&self, error: &AgentryError) {
        match &self.exception_handler {
            Some(handler) => handler(error),
            None => error!(agent = %self.name, error = %error, "unhandled agent exception"),
        }
    }
}

/// Builder for [`AgentDefinition`]. Provider resolution and validation happen
/// at [`register`](Self::register) time; a bad configuration never reaches an
/// invocation.
pub struct AgentBuilder {
    name: String,
    provider: Option<Arc<dyn GenerationProvider>>,
    settings: Option<ProviderSettings>,
    instructions_action: Option<String>,
    actions: HashMap<String, ActionFn>,
    callbacks: CallbackRegistry,
    operations: OperationRegistry,
    exception_handler: Option<ExceptionHandler>,
    queue_name: String,
}

impl AgentBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: None,
            settings: None,
            instructions_action: None,
            actions: HashMap::new(),
            callbacks: CallbackRegistry::new(),
            operations: OperationRegistry::new(),
            exception_handler: None,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
        }
    }

    /// Resolve the named configuration entry and construct its service
    /// provider. Fails here, at definition time, on a missing entry or an
    /// unknown service.
    pub fn generate_with(mut self, config_name: &str, table: &ProviderConfigTable) -> Result<Self> {
        let settings = table.get(config_name)?.clone();
        let provider = create_provider(&settings)?;
        self.provider = Some(provider);
        self.settings = Some(settings);
        Ok(self)
    }

    /// Use an already-constructed provider (tests, custom backends).
    pub fn with_provider(
        mut self,
        provider: Arc<dyn GenerationProvider>,
        settings: ProviderSettings,
    ) -> Self {
        self.provider = Some(provider);
        self.settings = Some(settings);
        self
    }

    /// Name of the action that renders system instructions when the invoked
    /// action did not set any.
    pub fn instructions(mut self, action_name: impl Into<String>) -> Self {
        self.instructions_action = Some(action_name.into());
        self
    }

    /// Declare a named action.
    pub fn action<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut AgentInstance, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Box::new(body));
        self
    }

    /// Declare the fallback action bound when resolution misses.
    pub fn fallback<F>(self, body: F) -> Self
    where
        F: Fn(&mut AgentInstance, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.action(FALLBACK_ACTION, body)
    }

    /// Register a named tool operation, executable from model output.
    pub fn operation<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&serde_json::Map<String, Value>) -> String + Send + Sync + 'static,
    {
        self.operations.register(name, body);
        self
    }

    pub fn before_action<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut AgentInstance) -> Result<ChainOutcome> + Send + Sync + 'static,
    {
        self.callbacks.before(callbacks::PROCESS_ACTION, hook);
        self
    }

    pub fn after_action<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut AgentInstance) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after(callbacks::PROCESS_ACTION, hook);
        self
    }

    pub fn around_action<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut AgentInstance, Next<'a>) -> BoxFuture<'a, Result<ChainOutcome>>
            + Send
            + Sync
            + 'static,
    {
        self.callbacks.around(callbacks::PROCESS_ACTION, hook);
        self
    }

    pub fn before_generate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut AgentInstance) -> Result<ChainOutcome> + Send + Sync + 'static,
    {
        self.callbacks.before(callbacks::GENERATE, hook);
        self
    }

    pub fn after_generate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut AgentInstance) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after(callbacks::GENERATE, hook);
        self
    }

    /// An after-generate hook that also fires when the provider call failed.
    pub fn after_generate_always<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut AgentInstance) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after_always(callbacks::GENERATE, hook);
        self
    }

    pub fn around_generate<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut AgentInstance, Next<'a>) -> BoxFuture<'a, Result<ChainOutcome>>
            + Send
            + Sync
            + 'static,
    {
        self.callbacks.around(callbacks::GENERATE, hook);
        self
    }

    /// Handler for failures surfaced by the queued-job runner.
    pub fn on_exception<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AgentryError) + Send + Sync + 'static,
    {
        self.exception_handler = Some(Box::new(handler));
        self
    }

    pub fn queue(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Finalize the definition.
    pub fn register(self) -> Result<Arc<AgentDefinition>> {
        let provider = self.provider.ok_or_else(|| {
            AgentryError::Configuration(format!("agent '{}' has no provider", self.name))
        })?;
        let settings = self
            .settings
            .expect("settings are set alongside the provider");

        if let Some(ref instructions_action) = self.instructions_action {
            if !self.actions.contains_key(instructions_action) {
                return Err(AgentryError::Configuration(format!(
                    "agent '{}' declares instructions action '{}' but no such action",
                    self.name, instructions_action
                )));
            }
        }

        // The built-in tool hook runs first among after-generate hooks, the
        // way the base behavior precedes per-agent hooks.
        let operations = Arc::new(self.operations);
        let mut callbacks = CallbackRegistry::new();
        {
            let operations = operations.clone();
            let agent_name = self.name.clone();
            callbacks.after(callbacks::GENERATE, move |instance| {
                perform_requested_tool(&agent_name, &operations, instance);
                Ok(())
            });
        }
        self.callbacks.drain_into(&mut callbacks);

        Ok(Arc::new(AgentDefinition {
            name: self.name,
            provider,
            settings,
            instructions_action: self.instructions_action,
            actions: self.actions,
            callbacks,
            operations,
            exception_handler: self.exception_handler,
            queue_name: self.queue_name,
        }))
    }
}

/// Execute the tool requested by the response envelope, if any. Tool output
/// is terminal within one invocation: logged and stored, never fed back.
fn perform_requested_tool(
    agent_name: &str,
    operations: &OperationRegistry,
    instance: &mut AgentInstance,
) {
    let Some(envelope) = instance.response.as_ref() else {
        return;
    };
    if !envelope.is_tool_call {
        return;
    }
    let Some(tool_name) = envelope.tool_name.as_deref() else {
        return;
    };
    let output = operations.process_tool(tool_name, &envelope.tool_arguments);
    info!(agent = %agent_name, tool = %tool_name, %output, "tool call executed");
    instance.tool_output = Some(output);
}
