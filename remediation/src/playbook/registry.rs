//! Classification to playbook table
//!
//! A complete registry is checked when it is built: every classification
//! must have exactly one playbook. Lookups on a complete registry cannot
//! fail; partial registries exist for tooling and tests.

use std::collections::BTreeMap;

use tracing::debug;

use super::Playbook;
use crate::classifier::Classification;
use crate::error::{RemediationError, RemediationResult};

/// Immutable mapping from classification to playbook
#[derive(Debug, Clone)]
pub struct PlaybookRegistry {
    playbooks: BTreeMap<Classification, Playbook>,
}

impl PlaybookRegistry {
    /// Build a registry that covers every classification
    pub fn build(playbooks: Vec<Playbook>) -> RemediationResult<Self> {
        let registry = Self::partial(playbooks)?;
        for classification in Classification::ALL {
            if !registry.playbooks.contains_key(&classification) {
                return Err(RemediationError::NoPlaybookForClassification { classification });
            }
        }
        debug!(count = registry.playbooks.len(), "Playbook registry built");
        Ok(registry)
    }

    /// Build a registry without the coverage check. Duplicates still fail.
    pub fn partial(playbooks: Vec<Playbook>) -> RemediationResult<Self> {
        let mut map: BTreeMap<Classification, Playbook> = BTreeMap::new();
        for playbook in playbooks {
            if let Some(existing) = map.get(&playbook.classification) {
                return Err(RemediationError::DuplicatePlaybook {
                    classification: playbook.classification,
                    first: existing.name.clone(),
                    second: playbook.name,
                });
            }
            map.insert(playbook.classification, playbook);
        }
        Ok(Self { playbooks: map })
    }

    /// Select the playbook for a classification
    pub fn select(&self, classification: Classification) -> RemediationResult<&Playbook> {
        self.playbooks
            .get(&classification)
            .ok_or(RemediationError::NoPlaybookForClassification { classification })
    }

    /// Replace the playbook for its classification, keeping the 1:1 table
    pub fn replace(&mut self, playbook: Playbook) -> Option<Playbook> {
        self.playbooks.insert(playbook.classification, playbook)
    }

    pub fn is_complete(&self) -> bool {
        Classification::ALL
            .iter()
            .all(|c| self.playbooks.contains_key(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playbook> {
        self.playbooks.values()
    }

    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}
