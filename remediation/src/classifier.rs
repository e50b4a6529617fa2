//! Signal classifier. Maps every signal to exactly one failure category.
//!
//! Pure and deterministic. Rules are evaluated in a fixed priority order and
//! the first match wins:
//!
//! ```text
//! 1. conflict id present                              → Conflict
//! 2. error code in {TIMEOUT, RATE_LIMIT, TEMP_NETWORK} → Transient
//! 3. queue depth > threshold OR backlog > SLO         → Capacity
//! 4. error code in {INPUT_MISSING, STALE_DATA}
//!    OR dependencies non-empty                        → DataDependency
//! 5. error code in {CONFIG_MISSING, AUTH_FAILED}      → Config
//! 6. status == error → Transient, otherwise           → Capacity
//! ```
//!
//! Rule 6 sends a healthy signal with no other markers to `Capacity`. That is
//! kept for compatibility with existing monitors.

use serde::{Deserialize, Serialize};

use crate::signal::{AgentStatus, Signal};

const TRANSIENT_CODES: &[&str] = &["TIMEOUT", "RATE_LIMIT", "TEMP_NETWORK"];
const DATA_DEPENDENCY_CODES: &[&str] = &["INPUT_MISSING", "STALE_DATA"];
const CONFIG_CODES: &[&str] = &["CONFIG_MISSING", "AUTH_FAILED"];

/// Failure category assigned to a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Conflict,
    Transient,
    Capacity,
    DataDependency,
    Config,
}

impl Classification {
    /// Every classification, in declaration order
    pub const ALL: [Classification; 5] = [
        Self::Conflict,
        Self::Transient,
        Self::Capacity,
        Self::DataDependency,
        Self::Config,
    ];

    /// Snake-case key used in config variables and playbook files
    pub fn key(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Capacity => "capacity",
            Self::DataDependency => "data_dependency",
            Self::Config => "config",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => write!(f, "Conflict"),
            Self::Transient => write!(f, "Transient"),
            Self::Capacity => write!(f, "Capacity"),
            Self::DataDependency => write!(f, "DataDependency"),
            Self::Config => write!(f, "Config"),
        }
    }
}

/// Thresholds consulted by rule 3
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    /// Queue depth strictly above this is a capacity problem
    pub queue_depth: u32,
    /// Backlog age (minutes) strictly above this breaches the SLO
    pub backlog_minutes: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            queue_depth: 5,
            backlog_minutes: 15.0,
        }
    }
}

/// Rule-ordered signal classifier
#[derive(Debug, Clone, Default)]
pub struct SignalClassifier {
    thresholds: ClassifierThresholds,
}

impl SignalClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify a signal. Total: every signal gets exactly one category.
    pub fn classify(&self, signal: &Signal) -> Classification {
        let ctx = &signal.context;
        let code = ctx.error_code.as_deref();
        let code_in = |set: &[&str]| code.is_some_and(|c| set.contains(&c));

        if ctx.conflict_id.is_some() {
            return Classification::Conflict;
        }

        if code_in(TRANSIENT_CODES) {
            return Classification::Transient;
        }

        let queue_over = ctx
            .queue_depth
            .is_some_and(|depth| depth > self.thresholds.queue_depth);
        if queue_over || signal.metrics.backlog_age_minutes > self.thresholds.backlog_minutes {
            return Classification::Capacity;
        }

        if code_in(DATA_DEPENDENCY_CODES) || !ctx.dependencies.is_empty() {
            return Classification::DataDependency;
        }

        if code_in(CONFIG_CODES) {
            return Classification::Config;
        }

        match signal.status {
            AgentStatus::Error => Classification::Transient,
            AgentStatus::Healthy | AgentStatus::Degraded => Classification::Capacity,
        }
    }
}
