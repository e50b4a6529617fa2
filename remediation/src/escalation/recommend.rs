//! Ranked alternatives offered to the authority
//!
//! Candidates are the catalog actions the failed playbook did not already
//! try, ordered by the configured action priority.

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::executor::ActionKind;

/// Alternatives offered per escalation
pub const MAX_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1 is the strongest suggestion
    pub rank: u32,
    pub action: ActionKind,
    pub rationale: String,
}

/// Rank untried actions for a classification
pub fn recommend(
    classification: Classification,
    tried: &[ActionKind],
    priority: &[ActionKind],
) -> Vec<Recommendation> {
    priority
        .iter()
        .copied()
        .filter(|action| !tried.contains(action))
        .take(MAX_RECOMMENDATIONS)
        .enumerate()
        .map(|(i, action)| Recommendation {
            rank: i as u32 + 1,
            action,
            rationale: rationale(classification, action),
        })
        .collect()
}

fn rationale(classification: Classification, action: ActionKind) -> String {
    let symptom = match classification {
        Classification::Conflict => "conflict persisted after priority rules",
        Classification::Transient => "agent kept failing after restart",
        Classification::Capacity => "backlog stayed above SLO after rebalancing",
        Classification::DataDependency => "inputs stayed invalid after refresh",
        Classification::Config => "configuration stayed unhealthy after repair",
    };
    let effect = match action {
        ActionKind::ApplyPriorityRules => "settle ownership by directive priority",
        ActionKind::ReassignOverlaps => "move overlapping work to one owner",
        ActionKind::ThrottleAgent => "reduce load on the agent",
        ActionKind::RestartAgent => "reset the agent process",
        ActionKind::RetryLastTask => "rerun the last task",
        ActionKind::ReallocateSlots => "shift execution slots",
        ActionKind::SplitDirective => "break the directive into smaller units",
        ActionKind::RefreshCache => "drop cached inputs",
        ActionKind::RefetchSource => "pull the upstream source again",
        ActionKind::ValidateInputs => "recheck the task inputs",
        ActionKind::CheckSecrets => "confirm credentials are present",
        ActionKind::MigrateSchemaIfNeeded => "bring the schema up to date",
    };
    format!("{symptom}; {action} may {effect}")
}
