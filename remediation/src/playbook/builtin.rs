//! Built-in playbook table, one per classification

use crate::classifier::Classification;
use crate::config::SloThresholds;
use crate::executor::{ActionKind, ArgRef};

use super::{Playbook, Step, SuccessCriteria};

/// Default base cost for a classification's playbook
pub fn default_base_cost(classification: Classification) -> u64 {
    match classification {
        Classification::Conflict => 3,
        Classification::Transient => 1,
        Classification::Capacity => 4,
        Classification::DataDependency => 2,
        Classification::Config => 2,
    }
}

/// The five built-in playbooks, thresholds taken from the SLOs
pub fn builtin_playbooks(slo: &SloThresholds) -> Vec<Playbook> {
    Classification::ALL
        .into_iter()
        .map(|c| builtin_playbook(c, slo))
        .collect()
}

fn builtin_playbook(classification: Classification, slo: &SloThresholds) -> Playbook {
    let (name, steps, criteria) = match classification {
        Classification::Conflict => (
            "ResolveInterAgentConflict",
            vec![
                Step::new(ActionKind::ApplyPriorityRules)
                    .arg("conflict", ArgRef::ConflictId)
                    .arg("agent", ArgRef::Agent),
                Step::new(ActionKind::ReassignOverlaps)
                    .arg("agent", ArgRef::ConflictLoser)
                    .arg("conflict", ArgRef::ConflictId),
            ],
            SuccessCriteria {
                conflict_cleared: Some(true),
                min_alignment: Some(slo.alignment),
                ..Default::default()
            },
        ),
        Classification::Transient => (
            "RestartAndRetryTransient",
            vec![
                Step::new(ActionKind::ThrottleAgent).arg("agent", ArgRef::Agent),
                Step::new(ActionKind::RestartAgent).arg("agent", ArgRef::Agent),
                Step::new(ActionKind::RetryLastTask)
                    .arg("agent", ArgRef::Agent)
                    .optional_arg("directive", ArgRef::DirectiveId),
            ],
            SuccessCriteria {
                last_task_succeeded: Some(true),
                ..Default::default()
            },
        ),
        Classification::Capacity => (
            "RebalanceCapacity",
            vec![
                Step::new(ActionKind::ReallocateSlots).arg("agent", ArgRef::Agent),
                Step::new(ActionKind::SplitDirective)
                    .arg("agent", ArgRef::Agent)
                    .optional_arg("directive", ArgRef::DirectiveId),
            ],
            SuccessCriteria {
                max_backlog_minutes: Some(slo.backlog_minutes),
                min_success_rate: Some(slo.success_rate),
                ..Default::default()
            },
        ),
        Classification::DataDependency => (
            "RefreshDataDependencies",
            vec![
                Step::new(ActionKind::RefreshCache)
                    .arg("agent", ArgRef::Agent)
                    .optional_arg("source", ArgRef::FirstDependency),
                Step::new(ActionKind::RefetchSource)
                    .arg("agent", ArgRef::Agent)
                    .optional_arg("source", ArgRef::FirstDependency),
                Step::new(ActionKind::ValidateInputs)
                    .arg("agent", ArgRef::Agent)
                    .optional_arg("directive", ArgRef::DirectiveId),
            ],
            SuccessCriteria {
                inputs_valid: Some(true),
                ..Default::default()
            },
        ),
        Classification::Config => (
            "RepairConfiguration",
            vec![
                Step::new(ActionKind::CheckSecrets).arg("agent", ArgRef::Agent),
                Step::new(ActionKind::MigrateSchemaIfNeeded).arg("agent", ArgRef::Agent),
            ],
            SuccessCriteria {
                config_healthy: Some(true),
                ..Default::default()
            },
        ),
    };

    Playbook {
        name: name.to_string(),
        classification,
        steps,
        criteria,
        base_cost: default_base_cost(classification),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_builtin_per_classification() {
        let playbooks = builtin_playbooks(&SloThresholds::default());
        assert_eq!(playbooks.len(), Classification::ALL.len());
        for c in Classification::ALL {
            assert_eq!(
                playbooks.iter().filter(|p| p.classification == c).count(),
                1,
                "{c}"
            );
        }
    }

    #[test]
    fn test_every_builtin_has_steps_and_criteria() {
        for p in builtin_playbooks(&SloThresholds::default()) {
            assert!(!p.steps.is_empty(), "{} has no steps", p.name);
            assert!(!p.criteria.is_empty(), "{} has no criteria", p.name);
        }
    }

    #[test]
    fn test_conflict_playbook_uses_alignment_slo() {
        let slo = SloThresholds {
            alignment: 0.72,
            ..Default::default()
        };
        let p = builtin_playbook(Classification::Conflict, &slo);
        assert_eq!(p.name, "ResolveInterAgentConflict");
        assert_eq!(p.criteria.min_alignment, Some(0.72));
        assert_eq!(p.criteria.conflict_cleared, Some(true));
    }
}
