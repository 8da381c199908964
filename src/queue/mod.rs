//! Job queue contract and the queued-generation runner.
//!
//! The transport is an external collaborator; this crate only defines the
//! enqueue contract and what the external runner must do with a descriptor.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::AgentRegistry;
use crate::error::Result;
use crate::generation::{execute_invocation, Runtime};

/// Everything needed to replay an invocation later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDescriptor {
    pub agent_class: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

/// Scheduling options passed through to the queue transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleOptions {
    /// Queue name; filled with the agent's queue when unset.
    pub queue: Option<String>,
    pub delay_seconds: Option<u64>,
    pub priority: Option<i64>,
}

/// Queue collaborator: enqueue with arguments, invoke later.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, descriptor: JobDescriptor, options: ScheduleOptions) -> Result<()>;
}

/// In-process queue, for tests and embedded runners.
#[derive(Default)]
pub struct InProcessQueue {
    jobs: Mutex<VecDeque<(JobDescriptor, ScheduleOptions)>>,
}

impl InProcessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }

    /// Take all queued jobs, in enqueue order.
    pub fn drain(&self) -> Vec<(JobDescriptor, ScheduleOptions)> {
        self.jobs.lock().unwrap().drain(..).collect()
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, descriptor: JobDescriptor, options: ScheduleOptions) -> Result<()> {
        self.jobs.lock().unwrap().push_back((descriptor, options));
        Ok(())
    }
}

/// Runs queued generation descriptors: resolve the agent class, replay the
/// inline pipeline, and route failures to the class exception handler
/// instead of crashing the worker.
pub struct GenerationJob {
    registry: Arc<AgentRegistry>,
    runtime: Runtime,
}

impl GenerationJob {
    pub fn new(registry: Arc<AgentRegistry>, runtime: Runtime) -> Self {
        Self { registry, runtime }
    }

    /// Perform one queued invocation.
    ///
    /// An unresolvable agent class propagates (there is no class to hand the
    /// failure to); anything after resolution goes to `handle_exception`.
    pub async fn perform(&self, descriptor: JobDescriptor) -> Result<()> {
        let definition = self.registry.get(&descriptor.agent_class)?;
        info!(
            agent = %descriptor.agent_class,
            action = %descriptor.action,
            "performing queued generation"
        );

        match execute_invocation(
            &definition,
            &self.runtime,
            &descriptor.action,
            descriptor.args,
            descriptor.params,
            descriptor.context,
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(
                    agent = %definition.name(),
                    error = %err,
                    "queued generation failed, routing to exception handler"
                );
                definition.handle_exception(&err);
                Ok(())
            }
        }
    }
}
