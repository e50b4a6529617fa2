//! Recovery verifier
//!
//! Read-only. A failed metrics read counts as "not recovered".

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;
use crate::playbook::SuccessCriteria;
use crate::signal::SignalMetrics;

/// Agent state as reported by the agent-state collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    #[serde(flatten)]
    pub metrics: SignalMetrics,
    #[serde(default)]
    pub conflict_cleared: bool,
    #[serde(default)]
    pub last_task_succeeded: bool,
    #[serde(default)]
    pub inputs_valid: bool,
    #[serde(default)]
    pub config_healthy: bool,
}

impl AgentMetrics {
    /// Snapshot carrying only the numeric metrics, every flag false
    pub fn from_signal(metrics: SignalMetrics) -> Self {
        Self {
            metrics,
            conflict_cleared: false,
            last_task_succeeded: false,
            inputs_valid: false,
            config_healthy: false,
        }
    }
}

/// Source of current agent metrics, keyed by agent id
#[async_trait]
pub trait AgentStateSource: Send + Sync {
    async fn fetch_metrics(&self, agent_id: &str) -> Result<AgentMetrics, StateError>;
}

impl SuccessCriteria {
    /// Names of present predicates that the snapshot fails
    pub fn unmet(&self, snapshot: &AgentMetrics) -> Vec<&'static str> {
        let m = &snapshot.metrics;
        let mut unmet = Vec::new();
        if self.conflict_cleared.is_some_and(|want| snapshot.conflict_cleared != want) {
            unmet.push("conflict_cleared");
        }
        if self.min_alignment.is_some_and(|min| m.alignment_score < min) {
            unmet.push("min_alignment");
        }
        if self.min_success_rate.is_some_and(|min| m.success_rate < min) {
            unmet.push("min_success_rate");
        }
        if self
            .last_task_succeeded
            .is_some_and(|want| snapshot.last_task_succeeded != want)
        {
            unmet.push("last_task_succeeded");
        }
        if self
            .max_backlog_minutes
            .is_some_and(|max| m.backlog_age_minutes > max)
        {
            unmet.push("max_backlog_minutes");
        }
        if self.inputs_valid.is_some_and(|want| snapshot.inputs_valid != want) {
            unmet.push("inputs_valid");
        }
        if self.config_healthy.is_some_and(|want| snapshot.config_healthy != want) {
            unmet.push("config_healthy");
        }
        unmet
    }

    /// True iff every present predicate holds
    pub fn is_satisfied_by(&self, snapshot: &AgentMetrics) -> bool {
        self.unmet(snapshot).is_empty()
    }
}

/// Result of one verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub satisfied: bool,
    /// Snapshot used for the check; `None` when the read failed
    pub snapshot: Option<AgentMetrics>,
    pub unmet: Vec<String>,
}

/// Verifies recovery against playbook criteria
#[derive(Clone)]
pub struct RecoveryVerifier {
    state: Arc<dyn AgentStateSource>,
}

impl RecoveryVerifier {
    pub fn new(state: Arc<dyn AgentStateSource>) -> Self {
        Self { state }
    }

    /// Current metrics for an agent
    pub async fn snapshot(&self, agent_id: &str) -> Result<AgentMetrics, StateError> {
        self.state.fetch_metrics(agent_id).await
    }

    /// Fetch fresh metrics and evaluate every present predicate
    pub async fn check(&self, agent_id: &str, criteria: &SuccessCriteria) -> Verification {
        match self.state.fetch_metrics(agent_id).await {
            Ok(snapshot) => {
                let unmet = criteria.unmet(&snapshot);
                debug!(agent_id, unmet = ?unmet, "Verification evaluated");
                Verification {
                    satisfied: unmet.is_empty(),
                    snapshot: Some(snapshot),
                    unmet: unmet.into_iter().map(String::from).collect(),
                }
            }
            Err(e) => {
                warn!(agent_id, error = %e, "Metrics read failed during verification");
                Verification {
                    satisfied: false,
                    snapshot: None,
                    unmet: vec![format!("metrics unavailable: {e}")],
                }
            }
        }
    }

    /// Boolean form of [`check`](Self::check)
    pub async fn verify(&self, agent_id: &str, criteria: &SuccessCriteria) -> bool {
        self.check(agent_id, criteria).await.satisfied
    }
}
