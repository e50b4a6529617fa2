//! Action executor: resolves step templates and dispatches primitives
//!
//! A step runs under a time bound. A failing or timed-out step ends the
//! current attempt; the error is returned as data, never raised.

pub mod action;
pub mod primitives;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ActionError, RemediationError, RemediationResult};
use crate::playbook::{PlaybookRegistry, Step};
use crate::signal::Signal;

pub use action::{ActionKind, ArgRef, ResolvedArgs};
pub use primitives::{
    ActionPrimitive, ActionTable, AgentControl, BackoffPolicy, BackoffPrimitive, ControlPrimitive,
};

/// Outcome of running one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action: ActionKind,
    /// Resolved arguments; empty when resolution failed
    pub args: ResolvedArgs,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs playbook steps against the dispatch table
#[derive(Clone)]
pub struct ActionExecutor {
    table: ActionTable,
    step_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(table: ActionTable, step_timeout: Duration) -> Self {
        Self {
            table,
            step_timeout,
        }
    }

    /// Fail if any registered playbook uses an action the table lacks
    pub fn ensure_covers(&self, registry: &PlaybookRegistry) -> RemediationResult<()> {
        for playbook in registry.iter() {
            if let Some(action) = playbook.actions().find(|a| !self.table.contains(*a)) {
                return Err(RemediationError::MissingPrimitive {
                    action: action.name().to_string(),
                    playbook: playbook.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve and run one step
    pub async fn run_step(&self, step: &Step, signal: &Signal) -> ActionResult {
        let started = Instant::now();
        let (args, outcome) = match ResolvedArgs::resolve(step, signal) {
            Ok(args) => {
                let outcome = self.dispatch(step.action, &signal.agent_id, &args).await;
                (args, outcome)
            }
            Err(e) => (ResolvedArgs::default(), Err(e)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(()) => debug!(
                agent_id = %signal.agent_id,
                action = %step.action,
                elapsed_ms,
                "Step succeeded"
            ),
            Err(e) => warn!(
                agent_id = %signal.agent_id,
                action = %step.action,
                elapsed_ms,
                error = %e,
                "Step failed"
            ),
        }

        ActionResult {
            action: step.action,
            args,
            elapsed_ms,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Run steps in order, stopping after the first failure
    pub async fn run_steps(&self, steps: &[Step], signal: &Signal) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let result = self.run_step(step, signal).await;
            let failed = !result.ok();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    async fn dispatch(
        &self,
        action: ActionKind,
        agent_id: &str,
        args: &ResolvedArgs,
    ) -> Result<(), ActionError> {
        let primitive = self.table.get(action).ok_or_else(|| ActionError::Rejected {
            action: action.name().to_string(),
            reason: "no primitive wired".to_string(),
        })?;
        match tokio::time::timeout(self.step_timeout, primitive.invoke(agent_id, args)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActionError::Timeout {
                action: action.name().to_string(),
                after: self.step_timeout,
            }),
        }
    }
}
