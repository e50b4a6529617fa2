//! Action primitives and the dispatch table
//!
//! The agent-management surface is a collaborator behind [`AgentControl`].
//! Each catalog action is bound to an [`ActionPrimitive`] once, when the
//! table is built; dispatch is a map lookup on [`ActionKind`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::action::{ActionKind, ResolvedArgs};
use crate::error::ActionError;

/// External agent-management surface
#[async_trait]
pub trait AgentControl: Send + Sync {
    /// Perform one side-effecting action against an agent
    async fn perform(
        &self,
        agent_id: &str,
        action: ActionKind,
        args: &ResolvedArgs,
    ) -> Result<(), ActionError>;
}

/// A single dispatchable primitive
#[async_trait]
pub trait ActionPrimitive: Send + Sync {
    async fn invoke(&self, agent_id: &str, args: &ResolvedArgs) -> Result<(), ActionError>;
}

/// Forwards one action kind to the agent-management surface
pub struct ControlPrimitive {
    action: ActionKind,
    control: Arc<dyn AgentControl>,
}

impl ControlPrimitive {
    pub fn new(action: ActionKind, control: Arc<dyn AgentControl>) -> Self {
        Self { action, control }
    }
}

#[async_trait]
impl ActionPrimitive for ControlPrimitive {
    async fn invoke(&self, agent_id: &str, args: &ResolvedArgs) -> Result<(), ActionError> {
        self.control.perform(agent_id, self.action, args).await
    }
}

/// In-step exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first try; doubles for each following try
    pub base: Duration,
    /// Total tries, at least one
    pub max_tries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            max_tries: 3,
        }
    }
}

impl BackoffPolicy {
    /// Delay before try `k` (0-based)
    pub fn delay(&self, k: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(k))
    }
}

/// Waits `base * 2^k` before each try of the inner primitive
pub struct BackoffPrimitive {
    inner: Arc<dyn ActionPrimitive>,
    policy: BackoffPolicy,
}

impl BackoffPrimitive {
    pub fn new(inner: Arc<dyn ActionPrimitive>, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ActionPrimitive for BackoffPrimitive {
    async fn invoke(&self, agent_id: &str, args: &ResolvedArgs) -> Result<(), ActionError> {
        let tries = self.policy.max_tries.max(1);
        let mut last_err = None;
        for k in 0..tries {
            tokio::time::sleep(self.policy.delay(k)).await;
            match self.inner.invoke(agent_id, args).await {
                Ok(()) => return Ok(()),
                // An unresolvable argument will not fix itself
                Err(e @ ActionError::UnresolvedArgument { .. }) => return Err(e),
                Err(e) => {
                    debug!(agent_id, try_index = k, error = %e, "Backoff try failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ActionError::Rejected {
            action: "backoff".to_string(),
            reason: "no tries made".to_string(),
        }))
    }
}

/// Dispatch table from action kind to primitive
#[derive(Clone, Default)]
pub struct ActionTable {
    primitives: HashMap<ActionKind, Arc<dyn ActionPrimitive>>,
}

impl ActionTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every catalog action to the given surface. `retry-last-task` is
    /// wrapped in the backoff policy.
    pub fn for_control(control: Arc<dyn AgentControl>, backoff: BackoffPolicy) -> Self {
        let mut table = Self::new();
        for action in ActionKind::ALL {
            let direct: Arc<dyn ActionPrimitive> =
                Arc::new(ControlPrimitive::new(action, control.clone()));
            let primitive: Arc<dyn ActionPrimitive> = if action == ActionKind::RetryLastTask {
                Arc::new(BackoffPrimitive::new(direct, backoff))
            } else {
                direct
            };
            table.primitives.insert(action, primitive);
        }
        table
    }

    /// Bind (or rebind) one action
    pub fn register(mut self, action: ActionKind, primitive: Arc<dyn ActionPrimitive>) -> Self {
        self.primitives.insert(action, primitive);
        self
    }

    pub fn get(&self, action: ActionKind) -> Option<&Arc<dyn ActionPrimitive>> {
        self.primitives.get(&action)
    }

    pub fn contains(&self, action: ActionKind) -> bool {
        self.primitives.contains_key(&action)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}
