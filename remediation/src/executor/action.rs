//! Action catalog and typed argument references
//!
//! Action names are a closed set. Parsing an unknown name is an error at the
//! point the name enters the system (config or playbook file), so dispatch
//! never sees one.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ActionError, RemediationError};
use crate::playbook::Step;
use crate::signal::Signal;

/// Remediation primitives exposed by the agent-management surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    ApplyPriorityRules,
    ReassignOverlaps,
    ThrottleAgent,
    RestartAgent,
    RetryLastTask,
    ReallocateSlots,
    SplitDirective,
    RefreshCache,
    RefetchSource,
    ValidateInputs,
    CheckSecrets,
    MigrateSchemaIfNeeded,
}

impl ActionKind {
    /// Full catalog, in default priority order
    pub const ALL: [ActionKind; 12] = [
        Self::ApplyPriorityRules,
        Self::ReassignOverlaps,
        Self::ThrottleAgent,
        Self::RestartAgent,
        Self::RetryLastTask,
        Self::ReallocateSlots,
        Self::SplitDirective,
        Self::RefreshCache,
        Self::RefetchSource,
        Self::ValidateInputs,
        Self::CheckSecrets,
        Self::MigrateSchemaIfNeeded,
    ];

    /// Catalog name (kebab-case)
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApplyPriorityRules => "apply-priority-rules",
            Self::ReassignOverlaps => "reassign-overlaps",
            Self::ThrottleAgent => "throttle-agent",
            Self::RestartAgent => "restart-agent",
            Self::RetryLastTask => "retry-last-task",
            Self::ReallocateSlots => "reallocate-slots",
            Self::SplitDirective => "split-directive",
            Self::RefreshCache => "refresh-cache",
            Self::RefetchSource => "refetch-source",
            Self::ValidateInputs => "validate-inputs",
            Self::CheckSecrets => "check-secrets",
            Self::MigrateSchemaIfNeeded => "migrate-schema-if-needed",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = RemediationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| RemediationError::UnknownAction {
                name: wanted.to_string(),
            })
    }
}

/// Reference from a step argument to a field of the triggering signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgRef {
    /// The agent under remediation
    Agent,
    /// The agent that yielded in a conflict; the reporting agent is the loser
    ConflictLoser,
    DirectiveId,
    ConflictId,
    FirstDependency,
    ErrorCode,
    /// Fixed value, not taken from the signal
    Literal(String),
}

impl ArgRef {
    /// Resolve against a signal. `Err` carries the missing field name.
    pub fn resolve(&self, signal: &Signal) -> Result<String, &'static str> {
        let ctx = &signal.context;
        match self {
            Self::Agent | Self::ConflictLoser => Ok(signal.agent_id.clone()),
            Self::DirectiveId => ctx.directive_id.clone().ok_or("directive id"),
            Self::ConflictId => ctx.conflict_id.clone().ok_or("conflict id"),
            Self::FirstDependency => signal
                .first_dependency()
                .map(str::to_string)
                .ok_or("upstream dependency"),
            Self::ErrorCode => ctx.error_code.clone().ok_or("error code"),
            Self::Literal(value) => Ok(value.clone()),
        }
    }
}

/// Argument values after resolution, keyed by argument name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedArgs(BTreeMap<String, String>);

impl ResolvedArgs {
    /// Resolve a step's template. Required arguments fail on the first
    /// missing field; optional ones are dropped when absent.
    pub fn resolve(step: &Step, signal: &Signal) -> Result<Self, ActionError> {
        let mut values = BTreeMap::new();
        for (name, reference) in &step.args {
            let value =
                reference
                    .resolve(signal)
                    .map_err(|field| ActionError::UnresolvedArgument {
                        action: step.action.name().to_string(),
                        argument: name.clone(),
                        field,
                    })?;
            values.insert(name.clone(), value);
        }
        for (name, reference) in &step.optional {
            if let Ok(value) = reference.resolve(signal) {
                values.insert(name.clone(), value);
            }
        }
        Ok(Self(values))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{AgentStatus, SignalContext};

    #[test]
    fn test_catalog_names_parse_back() {
        for action in ActionKind::ALL {
            assert_eq!(action.name().parse::<ActionKind>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action_name_is_an_error() {
        let err = "reboot-universe".parse::<ActionKind>().unwrap_err();
        assert!(matches!(err, RemediationError::UnknownAction { ref name } if name == "reboot-universe"));
    }

    #[test]
    fn test_serde_name_matches_catalog_name() {
        let json = serde_json::to_string(&ActionKind::MigrateSchemaIfNeeded).unwrap();
        assert_eq!(json, "\"migrate-schema-if-needed\"");
    }

    #[test]
    fn test_resolve_args() {
        let signal = Signal::new("coo", AgentStatus::Error).with_context(SignalContext {
            directive_id: Some("d-7".into()),
            dependencies: vec!["crm".into(), "erp".into()],
            ..Default::default()
        });
        let step = Step::new(ActionKind::RefetchSource)
            .arg("agent", ArgRef::Agent)
            .arg("directive", ArgRef::DirectiveId)
            .arg("source", ArgRef::FirstDependency)
            .arg("mode", ArgRef::Literal("soft".into()));

        let args = ResolvedArgs::resolve(&step, &signal).unwrap();
        assert_eq!(args.get("agent"), Some("coo"));
        assert_eq!(args.get("directive"), Some("d-7"));
        assert_eq!(args.get("source"), Some("crm"));
        assert_eq!(args.get("mode"), Some("soft"));
    }

    #[test]
    fn test_optional_argument_dropped_when_absent() {
        let signal = Signal::new("coo", AgentStatus::Degraded);
        let step = Step::new(ActionKind::SplitDirective)
            .arg("agent", ArgRef::Agent)
            .optional_arg("directive", ArgRef::DirectiveId);

        let args = ResolvedArgs::resolve(&step, &signal).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("directive"), None);
    }

    #[test]
    fn test_missing_field_is_unresolved_argument() {
        let signal = Signal::new("coo", AgentStatus::Error);
        let step = Step::new(ActionKind::ApplyPriorityRules).arg("conflict", ArgRef::ConflictId);

        let err = ResolvedArgs::resolve(&step, &signal).unwrap_err();
        assert_eq!(
            err,
            ActionError::UnresolvedArgument {
                action: "apply-priority-rules".into(),
                argument: "conflict".into(),
                field: "conflict id",
            }
        );
    }
}
