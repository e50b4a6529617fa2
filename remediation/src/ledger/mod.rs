//! Decision lineage and KPI ledger
//!
//! Append-only. Every attempt and escalation gets the next sequence number
//! under one short-lived lock, so sequence order is arrival order. Appended
//! entries are also broadcast for live tailing.
//!
//! ```text
//! orchestrator ──record_attempt──▶ ┌──────────────┐ ──broadcast──▶ dashboard
//! gateway ─────record_escalation─▶ │ DecisionLedger│
//!                                  └──────┬───────┘
//!                                         ▼
//!                              history(limit) / kpis()
//! ```

pub mod kpi;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::classifier::Classification;
use crate::escalation::EscalationRecord;
use crate::executor::ActionResult;
use crate::verifier::AgentMetrics;

pub use kpi::{KpiAggregate, KpiAlert, KpiSnapshot};

/// Broadcast buffer for live subscribers
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to a ledger
pub type SharedLedger = Arc<DecisionLedger>;

/// One execute-then-verify cycle. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub incident_id: Uuid,
    pub agent_id: String,
    pub classification: Classification,
    pub playbook: String,
    /// 1-based
    pub attempt: u32,
    pub before: AgentMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<AgentMetrics>,
    pub ok: bool,
    pub duration_ms: u64,
    pub cost: u64,
    pub steps: Vec<ActionResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<String>,
}

impl AttemptRecord {
    /// First failed step, if the attempt stopped early
    pub fn failed_step(&self) -> Option<&ActionResult> {
        self.steps.iter().find(|s| !s.ok())
    }
}

/// Payload of a lineage entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum LineageRecord {
    Attempt(AttemptRecord),
    Escalation(EscalationRecord),
}

/// A lineage entry with its position and append time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEntry {
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: LineageRecord,
}

impl LineageEntry {
    pub fn agent_id(&self) -> &str {
        match &self.record {
            LineageRecord::Attempt(a) => &a.agent_id,
            LineageRecord::Escalation(e) => &e.agent_id,
        }
    }

    pub fn as_attempt(&self) -> Option<&AttemptRecord> {
        match &self.record {
            LineageRecord::Attempt(a) => Some(a),
            LineageRecord::Escalation(_) => None,
        }
    }

    pub fn as_escalation(&self) -> Option<&EscalationRecord> {
        match &self.record {
            LineageRecord::Escalation(e) => Some(e),
            LineageRecord::Attempt(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    entries: Vec<LineageEntry>,
    kpis: KpiAggregate,
}

/// Append-only lineage plus KPI counters
pub struct DecisionLedger {
    inner: Mutex<LedgerInner>,
    sender: broadcast::Sender<LineageEntry>,
    daily_budget_cap: u64,
}

impl DecisionLedger {
    pub fn new(daily_budget_cap: u64) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(LedgerInner::default()),
            sender,
            daily_budget_cap,
        }
    }

    pub fn shared(self) -> SharedLedger {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // Appends never leave the inner state half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an attempt. A verified attempt closes its incident as
    /// auto-resolved and contributes its own duration to MTTR.
    pub fn record_attempt(&self, record: AttemptRecord) -> u64 {
        let mut inner = self.lock();
        let kpis = &mut inner.kpis;
        kpis.cumulative_cost = kpis.cumulative_cost.saturating_add(record.cost);
        if record.ok {
            kpis.total_incidents += 1;
            kpis.auto_resolved += 1;
            kpis.resolution_ms_total = kpis.resolution_ms_total.saturating_add(record.duration_ms);
            kpis.resolutions += 1;
        }
        Self::append(&mut inner, &self.sender, LineageRecord::Attempt(record))
    }

    /// Append an escalation. Closes its incident as escalated.
    pub fn record_escalation(&self, record: EscalationRecord) -> u64 {
        let mut inner = self.lock();
        inner.kpis.total_incidents += 1;
        inner.kpis.escalated += 1;
        Self::append(&mut inner, &self.sender, LineageRecord::Escalation(record))
    }

    fn append(
        inner: &mut LedgerInner,
        sender: &broadcast::Sender<LineageEntry>,
        record: LineageRecord,
    ) -> u64 {
        let seq = inner.entries.len() as u64 + 1;
        let entry = LineageEntry {
            seq,
            recorded_at: Utc::now(),
            record,
        };
        // Sent under the lock so subscribers observe sequence order
        let receivers = sender.send(entry.clone()).unwrap_or(0);
        debug!(seq, receivers, agent_id = entry.agent_id(), "Lineage entry appended");
        inner.entries.push(entry);
        seq
    }

    /// Most recent `limit` entries, oldest first
    pub fn history(&self, limit: usize) -> Vec<LineageEntry> {
        let inner = self.lock();
        let start = inner.entries.len().saturating_sub(limit);
        inner.entries[start..].to_vec()
    }

    /// Every entry for one agent, oldest first
    pub fn entries_for(&self, agent_id: &str) -> Vec<LineageEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.agent_id() == agent_id)
            .cloned()
            .collect()
    }

    /// Last `n` attempts for one agent with their sequence numbers, oldest first
    pub fn recent_attempts(&self, agent_id: &str, n: usize) -> Vec<(u64, AttemptRecord)> {
        let inner = self.lock();
        let mut recent: Vec<(u64, AttemptRecord)> = inner
            .entries
            .iter()
            .rev()
            .filter_map(|e| e.as_attempt().map(|a| (e.seq, a)))
            .filter(|(_, a)| a.agent_id == agent_id)
            .take(n)
            .map(|(seq, a)| (seq, a.clone()))
            .collect();
        recent.reverse();
        recent
    }

    /// Last `n` attempts of one incident with their sequence numbers, oldest first
    pub fn incident_attempts(&self, incident_id: Uuid, n: usize) -> Vec<(u64, AttemptRecord)> {
        let inner = self.lock();
        let mut attempts: Vec<(u64, AttemptRecord)> = inner
            .entries
            .iter()
            .rev()
            .filter_map(|e| e.as_attempt().map(|a| (e.seq, a)))
            .filter(|(_, a)| a.incident_id == incident_id)
            .take(n)
            .map(|(seq, a)| (seq, a.clone()))
            .collect();
        attempts.reverse();
        attempts
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw counters
    pub fn aggregate(&self) -> KpiAggregate {
        self.lock().kpis
    }

    /// Counters with derived values
    pub fn kpis(&self) -> KpiSnapshot {
        self.aggregate().snapshot(self.daily_budget_cap)
    }

    /// Live feed of appended entries
    pub fn subscribe(&self) -> broadcast::Receiver<LineageEntry> {
        self.sender.subscribe()
    }
}

impl Default for DecisionLedger {
    fn default() -> Self {
        Self::new(100)
    }
}
