//! Callback chain engine.
//!
//! Named pipelines (`process_action`, `generate`) run a unit of work wrapped
//! by `before`, `around`, and `after` hooks. Halting is an explicit
//! [`ChainOutcome`] returned from a hook, never an error: an error means the
//! chain failed, a halt means it chose to stop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tracing::warn;

use crate::agent::AgentInstance;
use crate::error::Result;

/// Pipeline wrapping action resolution and the action body.
pub const PROCESS_ACTION: &str = "process_action";
/// Pipeline wrapping the provider call.
pub const GENERATE: &str = "generate";

/// Whether the chain should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    Continue,
    Halt,
}

/// A `before` hook. Returning [`ChainOutcome::Halt`] stops the chain before
/// the unit of work runs.
pub type BeforeHook = Box<dyn Fn(&mut AgentInstance) -> Result<ChainOutcome> + Send + Sync>;

type AfterFn = Box<dyn Fn(&mut AgentInstance) -> Result<()> + Send + Sync>;

struct AfterHook {
    hook: AfterFn,
    /// Fire even when the unit of work returned an error.
    on_failure: bool,
}

/// An `around` hook. It receives the rest of the chain as [`Next`] and must
/// call `next.run(instance)` to continue; not doing so halts the pipeline.
pub type AroundHook = Box<
    dyn for<'a> Fn(&'a mut AgentInstance, Next<'a>) -> BoxFuture<'a, Result<ChainOutcome>>
        + Send
        + Sync,
>;

/// The unit of work a pipeline runs.
pub type Work<'w> =
    Box<dyn for<'a> FnOnce(&'a mut AgentInstance) -> BoxFuture<'a, Result<()>> + Send + 'w>;

/// Box an async unit of work for pipeline execution.
pub fn boxed_work<'w, F>(f: F) -> Work<'w>
where
    F: for<'a> FnOnce(&'a mut AgentInstance) -> BoxFuture<'a, Result<()>> + Send + 'w,
{
    Box::new(f)
}

/// Wrap a synchronous unit of work for pipeline execution.
pub fn sync_work<'w, F>(f: F) -> Work<'w>
where
    F: FnOnce(&mut AgentInstance) -> Result<()> + Send + 'w,
{
    Box::new(move |instance| {
        let result = f(instance);
        Box::pin(async move { result })
    })
}

/// The remainder of a pipeline, handed to each `around` hook.
pub struct Next<'c> {
    arounds: &'c [AroundHook],
    work: Work<'c>,
    ran: &'c AtomicBool,
}

impl<'c> Next<'c> {
    /// Continue the chain: the next `around` hook, or the unit of work.
    pub async fn run(self, instance: &mut AgentInstance) -> Result<ChainOutcome> {
        match self.arounds.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    arounds: rest,
                    work: self.work,
                    ran: self.ran,
                };
                head(instance, next).await
            }
            None => {
                self.ran.store(true, Ordering::SeqCst);
                (self.work)(instance).await?;
                Ok(ChainOutcome::Continue)
            }
        }
    }
}

#[derive(Default)]
struct Pipeline {
    before: Vec<BeforeHook>,
    around: Vec<AroundHook>,
    after: Vec<AfterHook>,
}

impl Pipeline {
    async fn run(&self, instance: &mut AgentInstance, work: Work<'_>) -> Result<ChainOutcome> {
        for hook in &self.before {
            if hook(instance)? == ChainOutcome::Halt {
                return Ok(ChainOutcome::Halt);
            }
        }

        let ran = AtomicBool::new(false);
        let next = Next {
            arounds: &self.around,
            work,
            ran: &ran,
        };

        match next.run(instance).await {
            Ok(_) => {
                // An around hook that never continued skipped the work; the
                // hook's own return value is not trusted for this.
                if !ran.load(Ordering::SeqCst) {
                    return Ok(ChainOutcome::Halt);
                }
                for hook in &self.after {
                    (hook.hook)(instance)?;
                }
                Ok(ChainOutcome::Continue)
            }
            Err(err) => {
                for hook in &self.after {
                    if hook.on_failure {
                        if let Err(after_err) = (hook.hook)(instance) {
                            warn!(error = %after_err, "failure-safe after hook errored");
                        }
                    }
                }
                Err(err)
            }
        }
    }
}

/// Named-pipeline hook registry. Built once at agent definition time,
/// immutable during execution; concurrent runs do not interfere.
#[derive(Default)]
pub struct CallbackRegistry {
    pipelines: HashMap<&'static str, Pipeline>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(&mut self, pipeline: &'static str, hook: F)
    where
        F: Fn(&mut AgentInstance) -> Result<ChainOutcome> + Send + Sync + 'static,
    {
        self.pipelines
            .entry(pipeline)
            .or_default()
            .before
            .push(Box::new(hook));
    }

    pub fn after<F>(&mut self, pipeline: &'static str, hook: F)
    where
        F: Fn(&mut AgentInstance) -> Result<()> + Send + Sync + 'static,
    {
        self.push_after(pipeline, Box::new(hook), false);
    }

    /// Register an after hook that also fires when the unit of work failed.
    pub fn after_always<F>(&mut self, pipeline: &'static str, hook: F)
    where
        F: Fn(&mut AgentInstance) -> Result<()> + Send + Sync + 'static,
    {
        self.push_after(pipeline, Box::new(hook), true);
    }

    pub fn around<F>(&mut self, pipeline: &'static str, hook: F)
    where
        F: for<'a> Fn(&'a mut AgentInstance, Next<'a>) -> BoxFuture<'a, Result<ChainOutcome>>
            + Send
            + Sync
            + 'static,
    {
        self.pipelines
            .entry(pipeline)
            .or_default()
            .around
            .push(Box::new(hook));
    }

    fn push_after(&mut self, pipeline: &'static str, hook: AfterFn, on_failure: bool) {
        self.pipelines
            .entry(pipeline)
            .or_default()
            .after
            .push(AfterHook { hook, on_failure });
    }

    /// Append every hook from `self` onto `target`, preserving registration
    /// order within each phase.
    pub fn drain_into(self, target: &mut CallbackRegistry) {
        for (name, pipeline) in self.pipelines {
            let entry = target.pipelines.entry(name).or_default();
            entry.before.extend(pipeline.before);
            entry.around.extend(pipeline.around);
            entry.after.extend(pipeline.after);
        }
    }

    /// Execute a pipeline by name around the supplied unit of work.
    ///
    /// A name with no registered hooks runs the work directly.
    pub async fn run(
        &self,
        pipeline: &'static str,
        instance: &mut AgentInstance,
        work: Work<'_>,
    ) -> Result<ChainOutcome> {
        match self.pipelines.get(pipeline) {
            Some(p) => p.run(instance, work).await,
            None => {
                (work)(instance).await?;
                Ok(ChainOutcome::Continue)
            }
        }
    }
}
