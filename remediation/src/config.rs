//! Controller configuration
//!
//! `AutonomyConfig::default()` is fixed and does not read the environment.
//! `AutonomyConfig::from_env()` layers environment variables on top and
//! rejects values it cannot use.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::classifier::{Classification, ClassifierThresholds};
use crate::error::{RemediationError, RemediationResult};
use crate::executor::{ActionKind, BackoffPolicy};
use crate::playbook::builtin::default_base_cost;

/// Service-level objective thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SloThresholds {
    /// Minimum acceptable success rate (0.0–1.0)
    pub success_rate: f64,
    /// Minimum acceptable alignment score (0.0–1.0)
    pub alignment: f64,
    /// Maximum acceptable backlog age in minutes
    pub backlog_minutes: f64,
}

impl Default for SloThresholds {
    fn default() -> Self {
        Self {
            success_rate: 0.90,
            alignment: 0.80,
            backlog_minutes: 15.0,
        }
    }
}

/// Full controller configuration
#[derive(Debug, Clone)]
pub struct AutonomyConfig {
    /// When false, signals are escalated without running a playbook
    pub auto_remediate: bool,
    /// Attempts per signal before escalating (>= 1)
    pub max_attempts: u32,
    pub slo: SloThresholds,
    /// Queue depth strictly above this classifies as Capacity
    pub queue_depth_threshold: u32,
    /// Ranking used for escalation recommendations
    pub action_priority: Vec<ActionKind>,
    /// Cost units per day
    pub daily_budget_cap: u64,
    /// Base cost of each classification's playbook
    pub base_costs: BTreeMap<Classification, u64>,
    /// Bound on a single action primitive
    pub step_timeout: Duration,
    /// Bound on escalation delivery
    pub escalation_timeout: Duration,
    /// Backoff inside the retry-last-task primitive
    pub retry_backoff: BackoffPolicy,
    /// Optional playbook override file
    pub playbook_file: Option<PathBuf>,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            auto_remediate: true,
            max_attempts: 2,
            slo: SloThresholds::default(),
            queue_depth_threshold: 5,
            action_priority: ActionKind::ALL.to_vec(),
            daily_budget_cap: 100,
            base_costs: Classification::ALL
                .into_iter()
                .map(|c| (c, default_base_cost(c)))
                .collect(),
            step_timeout: Duration::from_millis(5000),
            escalation_timeout: Duration::from_millis(3000),
            retry_backoff: BackoffPolicy::default(),
            playbook_file: None,
        }
    }
}

impl AutonomyConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> RemediationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> RemediationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parsed::<bool, _>(&lookup, "AUTO_REMEDIATE_ENABLED")? {
            config.auto_remediate = v;
        }
        if let Some(v) = parsed::<u32, _>(&lookup, "MAX_ATTEMPTS")? {
            config.max_attempts = v;
        }
        if let Some(v) = parsed::<f64, _>(&lookup, "SLO_SUCCESS_RATE")? {
            config.slo.success_rate = v;
        }
        if let Some(v) = parsed::<f64, _>(&lookup, "SLO_ALIGNMENT")? {
            config.slo.alignment = v;
        }
        if let Some(v) = parsed::<f64, _>(&lookup, "SLO_BACKLOG_MINUTES")? {
            config.slo.backlog_minutes = v;
        }
        if let Some(v) = parsed::<u32, _>(&lookup, "QUEUE_DEPTH_THRESHOLD")? {
            config.queue_depth_threshold = v;
        }
        if let Some(raw) = lookup("ACTION_PRIORITY") {
            config.action_priority = parse_action_priority(&raw)?;
        }
        if let Some(v) = parsed::<u64, _>(&lookup, "DAILY_BUDGET_CAP")? {
            config.daily_budget_cap = v;
        }
        if let Some(v) = parsed::<u64, _>(&lookup, "STEP_TIMEOUT_MS")? {
            config.step_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u64, _>(&lookup, "ESCALATION_TIMEOUT_MS")? {
            config.escalation_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u64, _>(&lookup, "RETRY_BACKOFF_BASE_MS")? {
            config.retry_backoff.base = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u32, _>(&lookup, "RETRY_BACKOFF_MAX_TRIES")? {
            config.retry_backoff.max_tries = v;
        }
        for classification in Classification::ALL {
            let key = format!("PLAYBOOK_COST_{}", classification.key().to_uppercase());
            if let Some(v) = parsed::<u64, _>(&lookup, &key)? {
                config.base_costs.insert(classification, v);
            }
        }
        if let Some(path) = lookup("PLAYBOOK_FILE").filter(|s| !s.is_empty()) {
            config.playbook_file = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the controller cannot run with
    pub fn validate(&self) -> RemediationResult<()> {
        if self.max_attempts == 0 {
            return Err(RemediationError::invalid_config(
                "MAX_ATTEMPTS",
                "must be at least 1",
            ));
        }
        for (key, value) in [
            ("SLO_SUCCESS_RATE", self.slo.success_rate),
            ("SLO_ALIGNMENT", self.slo.alignment),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RemediationError::invalid_config(
                    key,
                    format!("{value} is outside [0, 1]"),
                ));
            }
        }
        if self.slo.backlog_minutes < 0.0 {
            return Err(RemediationError::invalid_config(
                "SLO_BACKLOG_MINUTES",
                "must not be negative",
            ));
        }
        if self.retry_backoff.max_tries == 0 {
            return Err(RemediationError::invalid_config(
                "RETRY_BACKOFF_MAX_TRIES",
                "must be at least 1",
            ));
        }
        if self.step_timeout.is_zero() {
            return Err(RemediationError::invalid_config(
                "STEP_TIMEOUT_MS",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Thresholds for the classifier's capacity rule
    pub fn classifier_thresholds(&self) -> ClassifierThresholds {
        ClassifierThresholds {
            queue_depth: self.queue_depth_threshold,
            backlog_minutes: self.slo.backlog_minutes,
        }
    }

    pub fn base_cost(&self, classification: Classification) -> u64 {
        self.base_costs
            .get(&classification)
            .copied()
            .unwrap_or_else(|| default_base_cost(classification))
    }
}

/// Parse a comma-separated action ranking. Unknown names are errors.
pub fn parse_action_priority(raw: &str) -> RemediationResult<Vec<ActionKind>> {
    let mut ranking = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let action = ActionKind::from_str(name)?;
        if !ranking.contains(&action) {
            ranking.push(action);
        }
    }
    // Anything not named keeps catalog order after the named ones
    for action in ActionKind::ALL {
        if !ranking.contains(&action) {
            ranking.push(action);
        }
    }
    Ok(ranking)
}

fn parsed<T, F>(lookup: &F, key: &str) -> RemediationResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RemediationError::invalid_config(key, format!("'{raw}': {e}"))),
    }
}
