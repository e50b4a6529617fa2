//! Error types for the remediation controller
//!
//! Configuration-integrity errors surface at construction time. Step,
//! state-read and delivery errors are recovered inside the controller and
//! never cross the `execute` boundary.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::classifier::Classification;

/// Result type alias for controller construction and configuration
pub type RemediationResult<T> = Result<T, RemediationError>;

/// Errors raised while building or configuring the controller
#[derive(Error, Debug)]
pub enum RemediationError {
    /// Registry has no playbook for a classification
    #[error("No playbook registered for classification {classification}")]
    NoPlaybookForClassification { classification: Classification },

    /// Action name is not part of the primitive catalog
    #[error("Unknown action '{name}'")]
    UnknownAction { name: String },

    /// A registered playbook uses an action the dispatch table cannot serve
    #[error("No primitive wired for action '{action}' (used by playbook {playbook})")]
    MissingPrimitive { action: String, playbook: String },

    /// Two playbooks declared for the same classification
    #[error("Duplicate playbook for classification {classification}: {first} and {second}")]
    DuplicatePlaybook {
        classification: Classification,
        first: String,
        second: String,
    },

    /// Environment or flag value out of range or unparseable
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// Playbook override file could not be read or parsed
    #[error("Playbook file {path}: {message}")]
    PlaybookFile { path: PathBuf, message: String },

    /// HTTP client for a collaborator could not be built
    #[error("HTTP client for {collaborator}: {message}")]
    HttpClient {
        collaborator: &'static str,
        message: String,
    },
}

impl RemediationError {
    pub(crate) fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single playbook step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The agent-management surface refused the action
    #[error("{action} rejected: {reason}")]
    Rejected { action: String, reason: String },

    /// The primitive exceeded its time bound
    #[error("{action} timed out after {after:?}")]
    Timeout { action: String, after: Duration },

    /// The agent-management surface could not be reached
    #[error("{action} unreachable: {reason}")]
    Unreachable { action: String, reason: String },

    /// A step argument references a signal field that is absent
    #[error("{action} argument '{argument}' unresolved: signal has no {field}")]
    UnresolvedArgument {
        action: String,
        argument: String,
        field: &'static str,
    },
}

/// Failure reading agent metrics from the agent-state collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Agent state unreachable: {0}")]
    Unreachable(String),
}

/// Failure delivering an escalation to the authority channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Authority channel timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authority channel rejected escalation: {0}")]
    Rejected(String),

    #[error("Authority channel transport error: {0}")]
    Transport(String),
}
