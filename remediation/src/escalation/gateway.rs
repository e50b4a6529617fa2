//! Escalation gateway
//!
//! Delivery is bounded by a timeout and never retried here. A failed or
//! timed-out delivery is logged and noted on the record; the record is
//! appended to the lineage in every case.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    AttemptSummary, EscalationPayload, EscalationReason, EscalationRecord, Recommendation,
    LAST_ATTEMPTS, ULTIMATE_AUTHORITY,
};
use crate::classifier::Classification;
use crate::error::DeliveryError;
use crate::ledger::SharedLedger;
use crate::signal::SignalContext;

/// Outbound channel to the authority override endpoint
#[async_trait]
pub trait AuthorityChannel: Send + Sync {
    async fn deliver(&self, payload: &EscalationPayload) -> Result<(), DeliveryError>;
}

/// What the orchestrator knows when it escalates
#[derive(Debug, Clone)]
pub struct EscalationRequest<'a> {
    pub incident_id: Uuid,
    pub agent_id: &'a str,
    pub classification: Classification,
    /// Playbook that was exhausted; `None` when no playbook ran
    pub playbook: Option<&'a str>,
    pub context: &'a SignalContext,
    pub reason: EscalationReason,
    pub recommendations: Vec<Recommendation>,
}

/// Packages escalations, delivers them and records them
#[derive(Clone)]
pub struct EscalationGateway {
    channel: Arc<dyn AuthorityChannel>,
    ledger: SharedLedger,
    timeout: Duration,
}

impl EscalationGateway {
    pub fn new(channel: Arc<dyn AuthorityChannel>, ledger: SharedLedger, timeout: Duration) -> Self {
        Self {
            channel,
            ledger,
            timeout,
        }
    }

    /// Build, deliver and record one escalation. Returns its lineage sequence number.
    pub async fn escalate(&self, request: EscalationRequest<'_>) -> u64 {
        let recent = self
            .ledger
            .incident_attempts(request.incident_id, LAST_ATTEMPTS);
        let mut record = EscalationRecord {
            escalation_id: Uuid::new_v4(),
            incident_id: request.incident_id,
            target: ULTIMATE_AUTHORITY.to_string(),
            agent_id: request.agent_id.to_string(),
            reason: request.reason,
            classification: request.classification,
            playbook: request.playbook.map(str::to_string),
            context: request.context.clone(),
            last_attempts: recent
                .iter()
                .map(|(seq, attempt)| AttemptSummary::new(*seq, attempt))
                .collect(),
            recommendations: request.recommendations,
            lineage_refs: recent.iter().map(|(seq, _)| *seq).collect(),
            delivered: false,
            delivery_error: None,
        };

        let payload = EscalationPayload::from(&record);
        let outcome = match tokio::time::timeout(self.timeout, self.channel.deliver(&payload)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        };
        match outcome {
            Ok(()) => {
                record.delivered = true;
                info!(
                    agent_id = %record.agent_id,
                    escalation_id = %record.escalation_id,
                    reason = %record.reason,
                    "Escalation delivered to {}",
                    ULTIMATE_AUTHORITY
                );
            }
            Err(e) => {
                warn!(
                    agent_id = %record.agent_id,
                    escalation_id = %record.escalation_id,
                    error = %e,
                    "Escalation delivery failed; recording anyway"
                );
                record.delivery_error = Some(e.to_string());
            }
        }

        self.ledger.record_escalation(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AttemptRecord, DecisionLedger};
    use crate::signal::SignalMetrics;
    use crate::verifier::AgentMetrics;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inbox {
        received: Mutex<Vec<EscalationPayload>>,
        fail: bool,
        hang: bool,
    }

    #[async_trait]
    impl AuthorityChannel for Inbox {
        async fn deliver(&self, payload: &EscalationPayload) -> Result<(), DeliveryError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(DeliveryError::Transport("connection reset".into()));
            }
            self.received.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn attempt(incident_id: Uuid, agent: &str, n: u32) -> AttemptRecord {
        AttemptRecord {
            incident_id,
            agent_id: agent.into(),
            classification: Classification::Transient,
            playbook: "RestartAndRetryTransient".into(),
            attempt: n,
            before: AgentMetrics::from_signal(SignalMetrics::default()),
            after: None,
            ok: false,
            duration_ms: 5,
            cost: n as u64,
            steps: vec![],
            unmet: vec!["last_task_succeeded".into()],
        }
    }

    fn request(incident_id: Uuid, context: &SignalContext) -> EscalationRequest<'_> {
        EscalationRequest {
            incident_id,
            agent_id: "ops",
            classification: Classification::Transient,
            playbook: Some("RestartAndRetryTransient"),
            context,
            reason: EscalationReason::AutoRemediationFailed,
            recommendations: vec![],
        }
    }

    #[tokio::test]
    async fn test_carries_last_two_attempts_of_incident() {
        let ledger = DecisionLedger::default().shared();
        let incident = Uuid::new_v4();
        for n in 1..=3 {
            ledger.record_attempt(attempt(incident, "ops", n));
        }
        ledger.record_attempt(attempt(Uuid::new_v4(), "other", 1));

        let inbox = Arc::new(Inbox::default());
        let gateway = EscalationGateway::new(inbox.clone(), ledger.clone(), Duration::from_secs(1));
        let context = SignalContext::default();
        let seq = gateway.escalate(request(incident, &context)).await;

        assert_eq!(seq, 5);
        let received = inbox.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].lineage_ref, vec![2, 3]);
        assert_eq!(received[0].last_attempts[1].attempt, 3);

        let entry = &ledger.history(1)[0];
        assert!(entry.as_escalation().unwrap().delivered);
    }

    #[tokio::test]
    async fn test_earlier_incident_attempts_are_not_carried() {
        let ledger = DecisionLedger::default().shared();
        ledger.record_attempt(attempt(Uuid::new_v4(), "ops", 1));

        let inbox = Arc::new(Inbox::default());
        let gateway = EscalationGateway::new(inbox.clone(), ledger.clone(), Duration::from_secs(1));
        let context = SignalContext::default();
        let incident = Uuid::new_v4();
        gateway.escalate(request(incident, &context)).await;

        let received = inbox.received.lock().unwrap();
        assert!(received[0].last_attempts.is_empty());
        assert!(received[0].lineage_ref.is_empty());
        let record = ledger.history(1)[0].as_escalation().cloned().unwrap();
        assert_eq!(record.incident_id, incident);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_still_recorded() {
        let ledger = DecisionLedger::default().shared();
        let inbox = Arc::new(Inbox {
            fail: true,
            ..Default::default()
        });
        let gateway = EscalationGateway::new(inbox, ledger.clone(), Duration::from_secs(1));
        let context = SignalContext::default();
        gateway.escalate(request(Uuid::new_v4(), &context)).await;

        let history = ledger.history(10);
        assert_eq!(history.len(), 1);
        let record = history[0].as_escalation().unwrap();
        assert!(!record.delivered);
        assert!(record.delivery_error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(ledger.kpis().counters.escalated, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_channel_times_out() {
        let ledger = DecisionLedger::default().shared();
        let inbox = Arc::new(Inbox {
            hang: true,
            ..Default::default()
        });
        let gateway = EscalationGateway::new(inbox, ledger.clone(), Duration::from_millis(300));
        let context = SignalContext::default();
        gateway.escalate(request(Uuid::new_v4(), &context)).await;

        let record = ledger.history(1)[0].as_escalation().cloned().unwrap();
        assert!(!record.delivered);
        assert!(record.delivery_error.unwrap().contains("timed out"));
    }
}
