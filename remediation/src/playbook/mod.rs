//! Named, ordered remediation recipes plus their success criteria
//!
//! ```text
//! Classification ──1:1──▶ Playbook
//!                           ├─ steps: [Step { action, args: name → ArgRef }]
//!                           ├─ criteria: SuccessCriteria (sparse)
//!                           └─ base_cost → cost(n) = round(base · 1.5^(n-1))
//! ```

pub mod builtin;
pub mod file;
pub mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::executor::{ActionKind, ArgRef};

pub use builtin::builtin_playbooks;
pub use file::{load_playbook_file, parse_playbooks};
pub use registry::PlaybookRegistry;

/// Cost multiplier applied per additional attempt
pub const COST_GROWTH: f64 = 1.5;

/// One action invocation with its argument template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: ActionKind,
    #[serde(default)]
    pub args: BTreeMap<String, ArgRef>,
    /// Arguments passed only when the signal carries the field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional: BTreeMap<String, ArgRef>,
}

impl Step {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            args: BTreeMap::new(),
            optional: BTreeMap::new(),
        }
    }

    /// Add a required argument reference
    pub fn arg(mut self, name: &str, value: ArgRef) -> Self {
        self.args.insert(name.to_string(), value);
        self
    }

    /// Add an argument that is skipped when the signal lacks the field
    pub fn optional_arg(mut self, name: &str, value: ArgRef) -> Self {
        self.optional.insert(name.to_string(), value);
        self
    }
}

/// Sparse set of recovery predicates. Absent predicates always hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuccessCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_cleared: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_alignment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_success_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_task_succeeded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_backlog_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_healthy: Option<bool>,
}

impl SuccessCriteria {
    /// Number of predicates present
    pub fn len(&self) -> usize {
        [
            self.conflict_cleared.is_some(),
            self.min_alignment.is_some(),
            self.min_success_rate.is_some(),
            self.last_task_succeeded.is_some(),
            self.max_backlog_minutes.is_some(),
            self.inputs_valid.is_some(),
            self.config_healthy.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A remediation recipe for one classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    pub classification: Classification,
    pub steps: Vec<Step>,
    pub criteria: SuccessCriteria,
    /// Cost of the first attempt
    pub base_cost: u64,
}

impl Playbook {
    /// Cost of attempt `attempt` (1-based): `round(base · 1.5^(attempt-1))`
    pub fn attempt_cost(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1) as i32;
        (self.base_cost as f64 * COST_GROWTH.powi(exponent)).round() as u64
    }

    /// Actions used by this playbook, in step order
    pub fn actions(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.steps.iter().map(|s| s.action)
    }
}
