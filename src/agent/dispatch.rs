//! Action resolution and dispatch.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::callbacks::{self, sync_work, ChainOutcome};
use crate::error::{AgentryError, Result};

use super::{ActionFn, AgentDefinition, AgentInstance, FALLBACK_ACTION};

/// Resolve an action name against the declared set, falling back to the
/// `prompt` action. Pure lookup; no side effects.
pub fn resolve<'d>(definition: &'d AgentDefinition, action: &str) -> Result<&'d ActionFn> {
    if let Some(bound) = definition.action(action) {
        return Ok(bound);
    }
    if let Some(fallback) = definition.action(FALLBACK_ACTION) {
        return Ok(fallback);
    }
    Err(AgentryError::UnknownAction(format!(
        "{}#{}",
        definition.name(),
        action
    )))
}

/// Build an agent instance and run the bound action through the
/// `process_action` pipeline.
///
/// Caller-supplied `params` and `context` are copied onto the instance before
/// the action runs. When the definition names an instructions action and the
/// invoked action left instructions unset, the instructions action runs next
/// with the same arguments.
pub async fn process(
    definition: &AgentDefinition,
    action: &str,
    args: &[Value],
    params: HashMap<String, Value>,
    context: HashMap<String, Value>,
) -> Result<AgentInstance> {
    let bound = resolve(definition, action)?;
    let mut instance = AgentInstance::new(params, context);

    debug!(agent = %definition.name(), %action, "processing action");

    let outcome = definition
        .callbacks()
        .run(
            callbacks::PROCESS_ACTION,
            &mut instance,
            sync_work(move |instance| bound(instance, args)),
        )
        .await?;

    if outcome == ChainOutcome::Halt {
        return Err(AgentryError::Halted {
            pipeline: callbacks::PROCESS_ACTION,
        });
    }

    if instance.instructions.is_none() {
        if let Some(instructions_action) = definition.instructions_action() {
            if instructions_action != action {
                // Validated at registration; the action is known to exist.
                if let Some(renderer) = definition.action(instructions_action) {
                    renderer(&mut instance, args)?;
                }
            }
        }
    }

    Ok(instance)
}
