//! Deferred generation: the proxy between "invoked" and "materialized".

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::agent::{dispatch, AgentDefinition, AgentInstance};
use crate::callbacks::{self, boxed_work, ChainOutcome};
use crate::error::{AgentryError, Result};
use crate::queue::{JobDescriptor, JobQueue, ScheduleOptions};
use crate::storage::{MessageStore, Notifier};
use crate::streaming::StreamingAccumulator;
use crate::types::{Message, MessageAttributes, Role};

/// Shared collaborators threaded through every invocation.
#[derive(Clone)]
pub struct Runtime {
    pub store: Arc<dyn MessageStore>,
    pub notifier: Arc<dyn Notifier>,
    pub queue: Arc<dyn JobQueue>,
}

impl Runtime {
    pub fn new(
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            store,
            notifier,
            queue,
        }
    }
}

enum State {
    Pending {
        action: String,
        args: Vec<Value>,
        params: HashMap<String, Value>,
        context: HashMap<String, Value>,
    },
    Resolved(Message),
}

/// A deferred-execution handle: an action invocation not yet materialized
/// into a response.
///
/// Explicitly two-state: pending invocations carry their parameters, resolved
/// ones are an opaque read-only view of the produced message. Evaluation
/// happens at most once; every result-forcing read serves the memoized
/// message afterwards.
pub struct Generation {
    definition: Arc<AgentDefinition>,
    runtime: Runtime,
    state: State,
}

impl Generation {
    pub fn new(
        definition: Arc<AgentDefinition>,
        runtime: Runtime,
        action: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            definition,
            runtime,
            state: State::Pending {
                action: action.into(),
                args,
                params: HashMap::new(),
                context: HashMap::new(),
            },
        }
    }

    /// Attach caller parameters. Only meaningful before evaluation.
    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        if let State::Pending {
            params: ref mut slot,
            ..
        } = self.state
        {
            *slot = params;
        }
        self
    }

    /// Attach correlation context (e.g. `chat_id`). Only meaningful before
    /// evaluation.
    pub fn with_context(mut self, context: HashMap<String, Value>) -> Self {
        if let State::Pending {
            context: ref mut slot,
            ..
        } = self.state
        {
            *slot = context;
        }
        self
    }

    /// Whether the invocation has been evaluated.
    pub fn processed(&self) -> bool {
        matches!(self.state, State::Resolved(_))
    }

    /// Evaluate now. Idempotent: a second call returns the memoized message
    /// without re-invoking the provider.
    pub async fn generate_now(&mut self) -> Result<&Message> {
        if let State::Pending {
            action,
            args,
            params,
            context,
        } = &self.state
        {
            let instance = execute_invocation(
                &self.definition,
                &self.runtime,
                action,
                args.clone(),
                params.clone(),
                context.clone(),
            )
            .await?;
            let message = instance.message.ok_or_else(|| {
                AgentryError::InvalidState("generation completed without a message".into())
            })?;
            self.state = State::Resolved(message);
        }

        match &self.state {
            State::Resolved(message) => Ok(message),
            State::Pending { .. } => unreachable!("state resolved above"),
        }
    }

    /// Read the resulting message, forcing evaluation exactly once.
    pub async fn message(&mut self) -> Result<&Message> {
        self.generate_now().await
    }

    /// Read the resulting content, forcing evaluation exactly once.
    pub async fn content(&mut self) -> Result<String> {
        Ok(self.generate_now().await?.content.clone())
    }

    /// Defer evaluation to the job queue. Fails once the result has been
    /// observed: you cannot defer something already evaluated.
    pub async fn generate_later(&self, options: ScheduleOptions) -> Result<()> {
        let State::Pending {
            action,
            args,
            params,
            context,
        } = &self.state
        else {
            return Err(AgentryError::AlreadyProcessed);
        };

        let descriptor = JobDescriptor {
            agent_class: self.definition.name().to_string(),
            action: action.clone(),
            args: args.clone(),
            params: params.clone(),
            context: context.clone(),
        };
        let mut options = options;
        if options.queue.is_none() {
            options.queue = Some(self.definition.queue_name().to_string());
        }

        debug!(agent = %descriptor.agent_class, action = %descriptor.action, "enqueueing generation");
        self.runtime.queue.enqueue(descriptor, options).await
    }
}

/// The full invocation pipeline, shared by inline and queued execution:
/// dispatch the action, then run the provider call inside the `generate`
/// callback chain.
pub async fn execute_invocation(
    definition: &Arc<AgentDefinition>,
    runtime: &Runtime,
    action: &str,
    args: Vec<Value>,
    params: HashMap<String, Value>,
    context: HashMap<String, Value>,
) -> Result<AgentInstance> {
    let mut instance = dispatch::process(definition, action, &args, params, context).await?;

    let def = definition.clone();
    let rt = runtime.clone();
    let outcome = definition
        .callbacks()
        .run(
            callbacks::GENERATE,
            &mut instance,
            boxed_work(move |instance| {
                Box::pin(async move { perform_generation(&def, &rt, instance).await })
            }),
        )
        .await?;

    if outcome == ChainOutcome::Halt {
        return Err(AgentryError::Halted {
            pipeline: callbacks::GENERATE,
        });
    }

    Ok(instance)
}

/// The unit of work inside the `generate` pipeline: one provider call,
/// blocking or streamed, ending with a persisted assistant message.
async fn perform_generation(
    definition: &AgentDefinition,
    runtime: &Runtime,
    instance: &mut AgentInstance,
) -> Result<()> {
    let chat_id = instance.chat_id().unwrap_or_default();

    if instance.stream {
        let mut accumulator = StreamingAccumulator::prepare(
            runtime.store.clone(),
            runtime.notifier.clone(),
            &chat_id,
            instance.fan_out,
        )
        .await?;
        definition
            .provider()
            .stream(instance, &mut accumulator)
            .await?;
        // The first candidate is the one handed back through the proxy.
        instance.message = accumulator.into_messages().into_iter().next();
    } else {
        let envelope = definition.provider().generate(instance).await?;
        let message = runtime
            .store
            .create(MessageAttributes {
                chat_id,
                role: Role::Assistant,
                content: envelope.content.clone().unwrap_or_default(),
                response_number: 0,
            })
            .await?;
        runtime.notifier.notify_created(&message);
        instance.message = Some(message);
        instance.response = Some(envelope);
    }

    Ok(())
}
