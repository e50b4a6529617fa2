//! One agent's observed condition at a point in time
//!
//! Signals are produced by the health monitor and handed to the controller
//! by value. The controller only ever borrows them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse status reported by the health monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Healthy,
    Degraded,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Metrics snapshot for one agent
///
/// Also returned by the agent-state collaborator when verifying recovery,
/// which carries the extra flags in [`AgentMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMetrics {
    /// Fraction of recent tasks that succeeded (0.0–1.0)
    pub success_rate: f64,
    /// Alignment with the active objectives (0.0–1.0)
    pub alignment_score: f64,
    /// Age of the oldest queued item, in minutes
    pub backlog_age_minutes: f64,
    /// Spend per hour, in cost units
    pub cost_burn_rate: f64,
}

impl Default for SignalMetrics {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            alignment_score: 1.0,
            backlog_age_minutes: 0.0,
            cost_burn_rate: 0.0,
        }
    }
}

/// Optional markers attached by the health monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<u32>,
    /// Upstream dependency names, most significant first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// An immutable observation of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub agent_id: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub last_report: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: SignalMetrics,
    #[serde(default)]
    pub context: SignalContext,
}

impl Signal {
    /// Create a signal with default metrics and an empty context
    pub fn new(agent_id: impl Into<String>, status: AgentStatus) -> Self {
        Self {
            agent_id: agent_id.into(),
            status,
            last_report: String::new(),
            observed_at: Utc::now(),
            metrics: SignalMetrics::default(),
            context: SignalContext::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: SignalMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_context(mut self, context: SignalContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.last_report = report.into();
        self
    }

    /// First upstream dependency, if any
    pub fn first_dependency(&self) -> Option<&str> {
        self.context.dependencies.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_deserializes_from_monitor_json() {
        let json = r#"{
            "agentId": "cfo-agent",
            "status": "degraded",
            "lastReport": "queue stalled",
            "observedAt": "2026-01-05T10:00:00Z",
            "metrics": {
                "successRate": 0.6,
                "alignmentScore": 0.9,
                "backlogAgeMinutes": 42.0,
                "costBurnRate": 3.5
            },
            "context": { "queueDepth": 9, "dependencies": ["ledger-sync"] }
        }"#;

        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.agent_id, "cfo-agent");
        assert_eq!(signal.status, AgentStatus::Degraded);
        assert_eq!(signal.context.queue_depth, Some(9));
        assert_eq!(signal.first_dependency(), Some("ledger-sync"));
        assert!(signal.context.conflict_id.is_none());
    }

    #[test]
    fn test_builder_sets_fields() {
        let signal = Signal::new("coo", AgentStatus::Error)
            .with_report("retry budget exhausted")
            .with_context(SignalContext {
                dependencies: vec!["erp".into()],
                ..Default::default()
            });
        assert_eq!(signal.last_report, "retry budget exhausted");
        assert_eq!(signal.first_dependency(), Some("erp"));

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["lastReport"], "retry budget exhausted");
    }

    #[test]
    fn test_missing_metrics_and_context_default() {
        let json = r#"{"agentId":"a","status":"healthy","observedAt":"2026-01-05T10:00:00Z"}"#;
        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.metrics, SignalMetrics::default());
        assert_eq!(signal.context, SignalContext::default());
        assert!(signal.first_dependency().is_none());
    }
}
