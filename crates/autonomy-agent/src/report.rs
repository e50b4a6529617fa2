//! Run report printed when the batch finishes

use serde::Serialize;

use remediation::{
    Classification, KpiAlert, KpiSnapshot, LineageEntry, RemediationOrchestrator,
    RemediationOutcome,
};

/// Per-signal line of the report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub agent_id: String,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    pub attempts: u32,
    pub resolved: bool,
    pub escalated: bool,
    pub total_cost: u64,
}

impl From<&RemediationOutcome> for OutcomeSummary {
    fn from(outcome: &RemediationOutcome) -> Self {
        Self {
            agent_id: outcome.agent_id.clone(),
            classification: outcome.classification,
            playbook: outcome.playbook.clone(),
            attempts: outcome.attempts,
            resolved: outcome.resolved,
            escalated: outcome.escalated,
            total_cost: outcome.total_cost,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub kpis: KpiSnapshot,
    pub alerts: Vec<String>,
    pub outcomes: Vec<OutcomeSummary>,
    pub lineage: Vec<LineageEntry>,
}

impl RunReport {
    pub fn new(
        orchestrator: &RemediationOrchestrator,
        outcomes: &[RemediationOutcome],
        lineage_limit: usize,
    ) -> Self {
        let kpis = orchestrator.get_kpi_metrics();
        Self {
            alerts: kpis.alerts().iter().map(KpiAlert::to_string).collect(),
            kpis,
            outcomes: outcomes.iter().map(OutcomeSummary::from).collect(),
            lineage: orchestrator.get_decision_lineage(lineage_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remediation::ledger::KpiAggregate;

    fn outcome(agent: &str, resolved: bool) -> RemediationOutcome {
        serde_json::from_value(serde_json::json!({
            "incidentId": "00000000-0000-0000-0000-000000000001",
            "agentId": agent,
            "classification": "transient",
            "playbook": "RestartAndRetryTransient",
            "attempts": 2,
            "resolved": resolved,
            "escalated": !resolved,
            "totalCost": 3,
            "lineageRefs": [1, 2, 3],
            "durationMs": 12,
            "transitions": []
        }))
        .unwrap()
    }

    #[test]
    fn test_summary_and_report_shape() {
        let summary = OutcomeSummary::from(&outcome("ops", false));
        assert!(summary.escalated);
        assert_eq!(summary.total_cost, 3);

        let report = RunReport {
            kpis: KpiAggregate {
                total_incidents: 1,
                escalated: 1,
                cumulative_cost: 3,
                ..Default::default()
            }
            .snapshot(100),
            alerts: vec![],
            outcomes: vec![summary],
            lineage: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kpis"]["totalIncidents"], 1);
        assert_eq!(json["outcomes"][0]["agentId"], "ops");
        assert_eq!(json["outcomes"][0]["classification"], "transient");
    }
}
