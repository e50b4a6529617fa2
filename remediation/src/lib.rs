//! Autonomous remediation controller
//!
//! Takes a health signal about a managed agent, classifies the failure,
//! runs the matching playbook under a bounded attempt loop, verifies
//! recovery and escalates to the ultimate authority when local remediation
//! is exhausted. Every attempt and escalation lands in an append-only
//! decision lineage with running KPIs.
//!
//! # Modules
//!
//! - [`classifier`]: signal → classification, fixed rule order
//! - [`playbook`]: playbooks, the registry and the TOML override file
//! - [`executor`]: action catalog, argument templates, dispatch table
//! - [`verifier`]: success criteria against fresh agent metrics
//! - [`orchestrator`]: state machine and the attempt loop
//! - [`escalation`]: escalation records, recommendations, delivery
//! - [`ledger`]: decision lineage and KPI aggregate
//! - [`http`]: reqwest adapters for the external collaborators
//!
//! # Usage
//!
//! ```ignore
//! let config = AutonomyConfig::from_env()?;
//! let orchestrator = RemediationOrchestrator::new(config, collaborators)?.shared();
//! let outcome = orchestrator.execute(&signal).await;
//! println!("{}", serde_json::to_string(&orchestrator.get_kpi_metrics())?);
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod http;
pub mod ledger;
pub mod orchestrator;
pub mod playbook;
pub mod signal;
pub mod verifier;

pub use classifier::{Classification, ClassifierThresholds, SignalClassifier};
pub use config::{AutonomyConfig, SloThresholds};
pub use error::{ActionError, DeliveryError, RemediationError, RemediationResult, StateError};
pub use escalation::{
    AuthorityChannel, EscalationGateway, EscalationPayload, EscalationReason, EscalationRecord,
    Recommendation,
};
pub use executor::{ActionExecutor, ActionKind, ActionResult, ActionTable, AgentControl, ArgRef};
pub use http::{HttpAgentControl, HttpAgentState, HttpAuthorityChannel};
pub use ledger::{
    AttemptRecord, DecisionLedger, KpiAlert, KpiSnapshot, LineageEntry, LineageRecord,
    SharedLedger,
};
pub use orchestrator::{
    Collaborators, RemediationOrchestrator, RemediationOutcome, RemediationState,
    SharedOrchestrator,
};
pub use playbook::{Playbook, PlaybookRegistry, Step, SuccessCriteria};
pub use signal::{AgentStatus, Signal, SignalContext, SignalMetrics};
pub use verifier::{AgentMetrics, AgentStateSource, RecoveryVerifier};
