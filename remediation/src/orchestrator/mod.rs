//! Remediation orchestrator
//!
//! Drives one signal through classify → select → bounded attempts →
//! succeed or escalate. Runs for different agents proceed in parallel;
//! runs for the same agent queue behind a per-agent lock held for the
//! whole attempt loop.
//!
//! ```text
//!  Signal ─▶ classify ─▶ select ─▶ ┌── attempt n ─────────────────────┐
//!                                  │ snapshot → steps → verify → cost │──▶ ledger
//!                                  └───────────────┬──────────────────┘
//!                                     ok │         │ n == max
//!                                        ▼         ▼
//!                                    Succeeded   Escalated ─▶ gateway ─▶ ledger
//! ```
//!
//! `execute` never returns an error. Step failures, metrics read failures
//! and delivery failures all end in a recorded attempt or escalation.

pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::{Classification, SignalClassifier};
use crate::config::AutonomyConfig;
use crate::error::RemediationResult;
use crate::escalation::{
    recommend, AuthorityChannel, EscalationGateway, EscalationReason, EscalationRequest,
};
use crate::executor::{ActionExecutor, ActionKind, ActionResult, ActionTable, AgentControl};
use crate::ledger::{AttemptRecord, DecisionLedger, KpiSnapshot, LineageEntry, SharedLedger};
use crate::playbook::{builtin_playbooks, load_playbook_file, Playbook, PlaybookRegistry};
use crate::signal::Signal;
use crate::verifier::{AgentMetrics, AgentStateSource, RecoveryVerifier, Verification};

pub use state::{IllegalTransition, RemediationState, RemediationStateMachine, TransitionRecord};

/// Shared reference to an orchestrator
pub type SharedOrchestrator = Arc<RemediationOrchestrator>;

/// External surfaces the controller talks to
#[derive(Clone)]
pub struct Collaborators {
    pub control: Arc<dyn AgentControl>,
    pub state: Arc<dyn AgentStateSource>,
    pub authority: Arc<dyn AuthorityChannel>,
}

/// What happened to one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationOutcome {
    pub incident_id: Uuid,
    pub agent_id: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    pub attempts: u32,
    pub resolved: bool,
    pub escalated: bool,
    pub total_cost: u64,
    /// Lineage entries appended for this signal, in order
    pub lineage_refs: Vec<u64>,
    pub duration_ms: u64,
    pub transitions: Vec<TransitionRecord>,
}

/// Build the playbook registry for a configuration: built-ins with the
/// configured base costs, then any override file on top.
pub fn load_registry(config: &AutonomyConfig) -> RemediationResult<PlaybookRegistry> {
    let playbooks = builtin_playbooks(&config.slo)
        .into_iter()
        .map(|mut p| {
            p.base_cost = config.base_cost(p.classification);
            p
        })
        .collect();
    let mut registry = PlaybookRegistry::build(playbooks)?;

    if let Some(path) = &config.playbook_file {
        let overrides = load_playbook_file(path)?;
        info!(path = %path.display(), count = overrides.len(), "Loaded playbook overrides");
        for playbook in overrides {
            if let Some(previous) = registry.replace(playbook) {
                debug!(replaced = %previous.name, "Playbook overridden");
            }
        }
    }
    Ok(registry)
}

/// Closed-loop remediation controller
pub struct RemediationOrchestrator {
    config: AutonomyConfig,
    classifier: SignalClassifier,
    registry: PlaybookRegistry,
    executor: ActionExecutor,
    verifier: RecoveryVerifier,
    gateway: EscalationGateway,
    ledger: SharedLedger,
    agent_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RemediationOrchestrator {
    /// Wire the controller from configuration and collaborators
    pub fn new(config: AutonomyConfig, collaborators: Collaborators) -> RemediationResult<Self> {
        let registry = load_registry(&config)?;
        let table = ActionTable::for_control(collaborators.control, config.retry_backoff);
        let ledger = DecisionLedger::new(config.daily_budget_cap).shared();
        Self::from_parts(
            config,
            registry,
            table,
            collaborators.state,
            collaborators.authority,
            ledger,
        )
    }

    /// Wire the controller from explicit parts. Fails if the table lacks a
    /// primitive any registered playbook uses.
    pub fn from_parts(
        config: AutonomyConfig,
        registry: PlaybookRegistry,
        table: ActionTable,
        state: Arc<dyn AgentStateSource>,
        authority: Arc<dyn AuthorityChannel>,
        ledger: SharedLedger,
    ) -> RemediationResult<Self> {
        config.validate()?;
        if !registry.is_complete() {
            // Report the first uncovered classification
            for classification in Classification::ALL {
                registry.select(classification)?;
            }
        }
        let executor = ActionExecutor::new(table, config.step_timeout);
        executor.ensure_covers(&registry)?;

        let gateway = EscalationGateway::new(authority, ledger.clone(), config.escalation_timeout);
        info!(
            auto_remediate = config.auto_remediate,
            max_attempts = config.max_attempts,
            playbooks = registry.len(),
            "Remediation orchestrator ready"
        );
        Ok(Self {
            classifier: SignalClassifier::new(config.classifier_thresholds()),
            registry,
            executor,
            verifier: RecoveryVerifier::new(state),
            gateway,
            ledger,
            agent_locks: Mutex::new(HashMap::new()),
            config,
        })
    }

    pub fn shared(self) -> SharedOrchestrator {
        Arc::new(self)
    }

    pub fn config(&self) -> &AutonomyConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlaybookRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Current KPI counters and derived values
    pub fn get_kpi_metrics(&self) -> KpiSnapshot {
        self.ledger.kpis()
    }

    /// Most recent `limit` lineage entries, oldest first
    pub fn get_decision_lineage(&self, limit: usize) -> Vec<LineageEntry> {
        self.ledger.history(limit)
    }

    /// Handle one signal to completion
    pub async fn execute(&self, signal: &Signal) -> RemediationOutcome {
        let lock = self.agent_lock(&signal.agent_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.run(signal).await
        };
        drop(lock);
        self.release_agent_lock(&signal.agent_id);
        outcome
    }

    /// Spawn `execute` on the runtime and return immediately
    pub fn execute_detached(
        self: &Arc<Self>,
        signal: Signal,
    ) -> tokio::task::JoinHandle<RemediationOutcome> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.execute(&signal).await })
    }

    fn agent_lock(&self, agent_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.agent_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(agent_id.to_string()).or_default().clone()
    }

    fn release_agent_lock(&self, agent_id: &str) {
        let mut locks = self.agent_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Clones are only handed out under this mutex, so a count of one
        // means nobody holds or waits on the lock
        if locks.get(agent_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(agent_id);
        }
    }

    async fn run(&self, signal: &Signal) -> RemediationOutcome {
        let agent_id = signal.agent_id.as_str();
        let mut run = Run::new(self.config.max_attempts);

        let classification = self.classifier.classify(signal);
        run.transition(agent_id, RemediationState::Classified, Some(classification.key()));
        info!(agent_id, status = %signal.status, %classification, "Signal classified");

        if !self.config.auto_remediate {
            run.transition(
                agent_id,
                RemediationState::Escalated,
                Some("auto-remediation disabled"),
            );
            let seq = self
                .escalate(
                    signal,
                    run.incident_id,
                    classification,
                    None,
                    EscalationReason::AutoRemediationDisabled,
                )
                .await;
            run.lineage_refs.push(seq);
            return run.finish(signal, classification, None);
        }

        let playbook = match self.registry.select(classification) {
            Ok(playbook) => playbook,
            Err(e) => {
                // Unreachable with a complete registry; escalate rather than drop the signal
                error!(agent_id, error = %e, "No playbook selected");
                run.transition(agent_id, RemediationState::Escalated, Some("no playbook"));
                let seq = self
                    .escalate(
                        signal,
                        run.incident_id,
                        classification,
                        None,
                        EscalationReason::AutoRemediationFailed,
                    )
                    .await;
                run.lineage_refs.push(seq);
                return run.finish(signal, classification, None);
            }
        };
        run.transition(
            agent_id,
            RemediationState::PlaybookSelected,
            Some(playbook.name.as_str()),
        );

        for attempt in 1..=self.config.max_attempts {
            run.transition(agent_id, RemediationState::Attempting(attempt), None);
            let record = self
                .attempt(signal, run.incident_id, playbook, attempt)
                .await;
            let ok = record.ok;
            run.total_cost += record.cost;

            if ok {
                info!(
                    agent_id,
                    playbook = %playbook.name,
                    attempt,
                    cost = record.cost,
                    duration_ms = record.duration_ms,
                    "Remediation attempt verified"
                );
            } else {
                warn!(
                    agent_id,
                    playbook = %playbook.name,
                    attempt,
                    cost = record.cost,
                    unmet = ?record.unmet,
                    failed_step = ?record.failed_step().map(|s| s.action),
                    "Remediation attempt did not recover agent"
                );
            }
            let seq = self.ledger.record_attempt(record);
            run.lineage_refs.push(seq);

            if ok {
                run.transition(agent_id, RemediationState::Succeeded, None);
                return run.finish(signal, classification, Some(playbook));
            }
        }

        run.transition(
            agent_id,
            RemediationState::Escalated,
            Some("attempts exhausted"),
        );
        let seq = self
            .escalate(
                signal,
                run.incident_id,
                classification,
                Some(playbook),
                EscalationReason::AutoRemediationFailed,
            )
            .await;
        run.lineage_refs.push(seq);
        run.finish(signal, classification, Some(playbook))
    }

    /// One execute-then-verify cycle
    async fn attempt(
        &self,
        signal: &Signal,
        incident_id: Uuid,
        playbook: &Playbook,
        attempt: u32,
    ) -> AttemptRecord {
        let started = Instant::now();
        let agent_id = signal.agent_id.as_str();

        let before = match self.verifier.snapshot(agent_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(agent_id, error = %e, "Before-snapshot unavailable; using signal metrics");
                AgentMetrics::from_signal(signal.metrics)
            }
        };

        let steps: Vec<ActionResult> = self.executor.run_steps(&playbook.steps, signal).await;
        let verification = if steps.iter().all(ActionResult::ok) {
            self.verifier.check(agent_id, &playbook.criteria).await
        } else {
            // Aborted attempts are not verified; the after-snapshot is still taken
            Verification {
                satisfied: false,
                snapshot: self.verifier.snapshot(agent_id).await.ok(),
                unmet: Vec::new(),
            }
        };

        AttemptRecord {
            incident_id,
            agent_id: signal.agent_id.clone(),
            classification: playbook.classification,
            playbook: playbook.name.clone(),
            attempt,
            before,
            after: verification.snapshot,
            ok: verification.satisfied,
            duration_ms: started.elapsed().as_millis() as u64,
            cost: playbook.attempt_cost(attempt),
            steps,
            unmet: verification.unmet,
        }
    }

    async fn escalate(
        &self,
        signal: &Signal,
        incident_id: Uuid,
        classification: Classification,
        playbook: Option<&Playbook>,
        reason: EscalationReason,
    ) -> u64 {
        let tried: Vec<ActionKind> = playbook.map(|p| p.actions().collect()).unwrap_or_default();
        let recommendations = recommend(classification, &tried, &self.config.action_priority);
        self.gateway
            .escalate(EscalationRequest {
                incident_id,
                agent_id: &signal.agent_id,
                classification,
                playbook: playbook.map(|p| p.name.as_str()),
                context: &signal.context,
                reason,
                recommendations,
            })
            .await
    }
}

/// Bookkeeping for one signal's run
struct Run {
    incident_id: Uuid,
    started: Instant,
    machine: RemediationStateMachine,
    lineage_refs: Vec<u64>,
    total_cost: u64,
}

impl Run {
    fn new(max_attempts: u32) -> Self {
        Self {
            incident_id: Uuid::new_v4(),
            started: Instant::now(),
            machine: RemediationStateMachine::new(max_attempts),
            lineage_refs: Vec::new(),
            total_cost: 0,
        }
    }

    fn transition(&mut self, agent_id: &str, to: RemediationState, reason: Option<&str>) {
        let from = self.machine.current();
        match self.machine.advance(to, reason) {
            Ok(()) => debug!(agent_id, %from, %to, reason = ?reason, "State transition"),
            Err(e) => error!(agent_id, error = %e, "State transition rejected"),
        }
    }

    fn finish(
        self,
        signal: &Signal,
        classification: Classification,
        playbook: Option<&Playbook>,
    ) -> RemediationOutcome {
        let state = self.machine.current();
        RemediationOutcome {
            incident_id: self.incident_id,
            agent_id: signal.agent_id.clone(),
            classification,
            playbook: playbook.map(|p| p.name.clone()),
            attempts: self.machine.attempts(),
            resolved: state == RemediationState::Succeeded,
            escalated: state == RemediationState::Escalated,
            total_cost: self.total_cost,
            lineage_refs: self.lineage_refs,
            duration_ms: self.started.elapsed().as_millis() as u64,
            transitions: self.machine.into_transitions(),
        }
    }
}
