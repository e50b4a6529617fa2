//! Playbook override file (TOML)
//!
//! ```toml
//! [[playbook]]
//! classification = "capacity"
//! name = "ShedLoad"
//! base_cost = 5
//!
//! [[playbook.steps]]
//! action = "throttle-agent"
//! args = { agent = "agent", mode = { literal = "soft" } }
//! optional = { directive = "directive_id" }
//!
//! [playbook.criteria]
//! max_backlog_minutes = 10.0
//! ```
//!
//! Action names go through [`ActionKind::from_str`], so a typo fails the load.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use super::builtin::default_base_cost;
use super::{Playbook, Step, SuccessCriteria};
use crate::classifier::Classification;
use crate::error::{RemediationError, RemediationResult};
use crate::executor::{ActionKind, ArgRef};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlaybookFile {
    #[serde(default, rename = "playbook")]
    playbooks: Vec<RawPlaybook>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlaybook {
    classification: String,
    name: String,
    #[serde(default)]
    base_cost: Option<u64>,
    steps: Vec<RawStep>,
    #[serde(default)]
    criteria: SuccessCriteria,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    action: String,
    #[serde(default)]
    args: BTreeMap<String, ArgRef>,
    #[serde(default)]
    optional: BTreeMap<String, ArgRef>,
}

/// Read and parse a playbook override file
pub fn load_playbook_file(path: &Path) -> RemediationResult<Vec<Playbook>> {
    let text = std::fs::read_to_string(path).map_err(|e| RemediationError::PlaybookFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_playbooks(&text, path)
}

/// Parse playbook definitions. `origin` is only used in error messages.
pub fn parse_playbooks(text: &str, origin: &Path) -> RemediationResult<Vec<Playbook>> {
    let file_error = |message: String| RemediationError::PlaybookFile {
        path: origin.to_path_buf(),
        message,
    };

    let parsed: PlaybookFile = toml::from_str(text).map_err(|e| file_error(e.to_string()))?;

    let mut seen: HashSet<Classification> = HashSet::new();
    let mut playbooks = Vec::with_capacity(parsed.playbooks.len());
    for raw in parsed.playbooks {
        let classification = Classification::from_key(&raw.classification).ok_or_else(|| {
            file_error(format!(
                "playbook {} has unknown classification '{}'",
                raw.name, raw.classification
            ))
        })?;
        if raw.steps.is_empty() {
            return Err(file_error(format!("playbook {} has no steps", raw.name)));
        }
        if !seen.insert(classification) {
            let first = playbooks
                .iter()
                .find(|p: &&Playbook| p.classification == classification)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            return Err(RemediationError::DuplicatePlaybook {
                classification,
                first,
                second: raw.name,
            });
        }

        let steps = raw
            .steps
            .into_iter()
            .map(|step| {
                Ok(Step {
                    action: ActionKind::from_str(&step.action)?,
                    args: step.args,
                    optional: step.optional,
                })
            })
            .collect::<RemediationResult<Vec<_>>>()?;

        playbooks.push(Playbook {
            name: raw.name,
            classification,
            steps,
            criteria: raw.criteria,
            base_cost: raw
                .base_cost
                .unwrap_or_else(|| default_base_cost(classification)),
        });
    }
    Ok(playbooks)
}
