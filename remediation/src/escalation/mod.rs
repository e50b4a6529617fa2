//! Escalation to the ultimate authority
//!
//! Fired once per signal when local remediation is exhausted (or disabled).
//! The record is built from the ledger's attempts for the same incident,
//! delivered over an [`AuthorityChannel`] and then appended to the lineage
//! whatever the delivery outcome.

pub mod gateway;
pub mod recommend;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::Classification;
use crate::executor::ActionKind;
use crate::ledger::AttemptRecord;
use crate::signal::SignalContext;

pub use gateway::{AuthorityChannel, EscalationGateway, EscalationRequest};
pub use recommend::{recommend, Recommendation};

/// Role that receives every escalation
pub const ULTIMATE_AUTHORITY: &str = "ultimate-authority";

/// Attempt summaries carried per escalation
pub const LAST_ATTEMPTS: usize = 2;

/// Why the controller handed the incident over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationReason {
    /// Every attempt ran and none verified
    AutoRemediationFailed,
    /// Auto-remediation is switched off
    AutoRemediationDisabled,
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoRemediationFailed => write!(f, "auto-remediation failed"),
            Self::AutoRemediationDisabled => write!(f, "auto-remediation disabled"),
        }
    }
}

/// Condensed view of one attempt for the authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    /// Lineage position of the attempt
    pub seq: u64,
    pub attempt: u32,
    pub playbook: String,
    pub ok: bool,
    pub cost: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<String>,
}

impl AttemptSummary {
    pub fn new(seq: u64, record: &AttemptRecord) -> Self {
        let failed = record.failed_step();
        Self {
            seq,
            attempt: record.attempt,
            playbook: record.playbook.clone(),
            ok: record.ok,
            cost: record.cost,
            duration_ms: record.duration_ms,
            failed_step: failed.map(|s| s.action),
            error: failed.and_then(|s| s.error.clone()),
            unmet: record.unmet.clone(),
        }
    }
}

/// Escalation as stored in the lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
    pub escalation_id: Uuid,
    /// Incident this escalation closes
    pub incident_id: Uuid,
    pub target: String,
    pub agent_id: String,
    pub reason: EscalationReason,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    pub context: SignalContext,
    pub last_attempts: Vec<AttemptSummary>,
    pub recommendations: Vec<Recommendation>,
    /// Lineage sequence numbers backing this escalation
    pub lineage_refs: Vec<u64>,
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_error: Option<String>,
}

/// Body sent to the authority override endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationPayload {
    pub escalation_id: Uuid,
    pub target: String,
    pub reason: EscalationReason,
    pub agent: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    pub context: SignalContext,
    pub last_attempts: Vec<AttemptSummary>,
    pub recommended_options: Vec<Recommendation>,
    pub lineage_ref: Vec<u64>,
}

impl From<&EscalationRecord> for EscalationPayload {
    fn from(record: &EscalationRecord) -> Self {
        Self {
            escalation_id: record.escalation_id,
            target: record.target.clone(),
            reason: record.reason,
            agent: record.agent_id.clone(),
            classification: record.classification,
            playbook: record.playbook.clone(),
            context: record.context.clone(),
            last_attempts: record.last_attempts.clone(),
            recommended_options: record.recommendations.clone(),
            lineage_ref: record.lineage_refs.clone(),
        }
    }
}
