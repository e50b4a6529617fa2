//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use remediation::executor::ResolvedArgs;
use remediation::{
    ActionError, ActionKind, AgentControl, AgentMetrics, AgentStateSource, AuthorityChannel,
    AutonomyConfig, Collaborators, DeliveryError, EscalationPayload, RemediationOrchestrator,
    SignalMetrics, StateError,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

pub fn healthy_metrics() -> AgentMetrics {
    AgentMetrics {
        metrics: SignalMetrics {
            success_rate: 0.99,
            alignment_score: 0.95,
            backlog_age_minutes: 1.0,
            cost_burn_rate: 2.0,
        },
        conflict_cleared: true,
        last_task_succeeded: true,
        inputs_valid: true,
        config_healthy: true,
    }
}

pub fn degraded_metrics() -> AgentMetrics {
    AgentMetrics::from_signal(SignalMetrics {
        success_rate: 0.4,
        alignment_score: 0.3,
        backlog_age_minutes: 40.0,
        cost_burn_rate: 9.0,
    })
}

/// One primitive call as seen by the control surface
#[derive(Debug, Clone)]
pub struct Call {
    pub agent_id: String,
    pub action: ActionKind,
    pub args: ResolvedArgs,
}

/// Records every action; can fail one action kind and can hold each call
/// open for a while to expose overlapping runs. `held_agent` narrows the
/// hold to one agent's calls.
#[derive(Default)]
pub struct FakeControl {
    pub calls: Mutex<Vec<Call>>,
    pub fail_on: Option<ActionKind>,
    pub hold: Duration,
    pub held_agent: Option<String>,
    in_flight: Mutex<Vec<String>>,
    pub overlaps: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeControl {
    pub fn failing_on(action: ActionKind) -> Self {
        Self {
            fail_on: Some(action),
            ..Default::default()
        }
    }

    pub fn holding(hold: Duration) -> Self {
        Self {
            hold,
            ..Default::default()
        }
    }

    pub fn holding_agent(agent_id: &str, hold: Duration) -> Self {
        Self {
            hold,
            held_agent: Some(agent_id.to_string()),
            ..Default::default()
        }
    }

    pub fn actions(&self) -> Vec<ActionKind> {
        self.calls.lock().unwrap().iter().map(|c| c.action).collect()
    }
}

#[async_trait]
impl AgentControl for FakeControl {
    async fn perform(
        &self,
        agent_id: &str,
        action: ActionKind,
        args: &ResolvedArgs,
    ) -> Result<(), ActionError> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if in_flight.iter().any(|a| a == agent_id) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            in_flight.push(agent_id.to_string());
            self.max_in_flight.fetch_max(in_flight.len(), Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(Call {
            agent_id: agent_id.to_string(),
            action,
            args: args.clone(),
        });
        let held = self.held_agent.as_deref().map_or(true, |a| a == agent_id);
        if held && !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(pos) = in_flight.iter().position(|a| a == agent_id) {
                in_flight.remove(pos);
            }
        }
        if self.fail_on == Some(action) {
            return Err(ActionError::Rejected {
                action: action.name().to_string(),
                reason: "refused by fake".to_string(),
            });
        }
        Ok(())
    }
}

/// How the fake agent-state source answers
#[derive(Debug, Clone, Copy)]
pub enum Recovery {
    Always,
    Never,
    /// Healthy from the verification of this attempt on. Each attempt whose
    /// steps all succeed reads metrics twice (before, verify).
    OnAttempt(u32),
    Unreachable,
}

pub struct FakeState {
    recovery: Recovery,
    pub fetches: AtomicUsize,
}

impl FakeState {
    pub fn new(recovery: Recovery) -> Self {
        Self {
            recovery,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AgentStateSource for FakeState {
    async fn fetch_metrics(&self, _agent_id: &str) -> Result<AgentMetrics, StateError> {
        let fetch = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        match self.recovery {
            Recovery::Always => Ok(healthy_metrics()),
            Recovery::Never => Ok(degraded_metrics()),
            Recovery::OnAttempt(n) if fetch >= 2 * n as usize => Ok(healthy_metrics()),
            Recovery::OnAttempt(_) => Ok(degraded_metrics()),
            Recovery::Unreachable => Err(StateError::Unreachable("fake is down".into())),
        }
    }
}

#[derive(Default)]
pub struct FakeAuthority {
    pub received: Mutex<Vec<EscalationPayload>>,
    pub fail: bool,
}

impl FakeAuthority {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthorityChannel for FakeAuthority {
    async fn deliver(&self, payload: &EscalationPayload) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected("503 Service Unavailable".into()));
        }
        self.received.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Configuration with near-zero in-step backoff so tests stay fast
pub fn test_config() -> AutonomyConfig {
    let mut config = AutonomyConfig::default();
    config.retry_backoff.base = Duration::from_millis(1);
    config
}

pub struct Harness {
    pub control: Arc<FakeControl>,
    pub state: Arc<FakeState>,
    pub authority: Arc<FakeAuthority>,
    pub orchestrator: Arc<RemediationOrchestrator>,
}

pub fn harness(
    config: AutonomyConfig,
    control: FakeControl,
    recovery: Recovery,
    authority: FakeAuthority,
) -> Harness {
    let control = Arc::new(control);
    let state = Arc::new(FakeState::new(recovery));
    let authority = Arc::new(authority);
    let orchestrator = RemediationOrchestrator::new(
        config,
        Collaborators {
            control: control.clone(),
            state: state.clone(),
            authority: authority.clone(),
        },
    )
    .expect("orchestrator builds")
    .shared();
    Harness {
        control,
        state,
        authority,
        orchestrator,
    }
}
