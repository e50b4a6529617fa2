//! Remediation state machine with legal-transition guards.
//!
//! One machine lives for one signal. Every run starts at `Received` and ends
//! at `Succeeded` or `Escalated`; the attempt counter can never pass the
//! configured bound.
//!
//! ```text
//! Received → Classified
//! Classified → PlaybookSelected | Escalated
//! PlaybookSelected → Attempting(1)
//! Attempting(n) → Succeeded | Attempting(n+1) | Escalated     (n+1 ≤ max)
//! ```

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationState {
    Received,
    Classified,
    PlaybookSelected,
    /// Running attempt n (1-based)
    Attempting(u32),
    Succeeded,
    Escalated,
}

impl RemediationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Escalated)
    }
}

impl fmt::Display for RemediationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "Received"),
            Self::Classified => write!(f, "Classified"),
            Self::PlaybookSelected => write!(f, "PlaybookSelected"),
            Self::Attempting(n) => write!(f, "Attempting({n})"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Escalated => write!(f, "Escalated"),
        }
    }
}

fn is_legal_transition(from: RemediationState, to: RemediationState, max_attempts: u32) -> bool {
    use RemediationState::*;

    matches!(
        (from, to),
        (Received, Classified)
            | (Classified, PlaybookSelected)
            // Auto-remediation off
            | (Classified, Escalated)
            | (PlaybookSelected, Attempting(1))
            | (Attempting(_), Succeeded)
            | (Attempting(_), Escalated)
    ) || matches!((from, to), (Attempting(n), Attempting(m)) if m == n + 1 && m <= max_attempts)
}

/// A single recorded state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub from: RemediationState,
    pub to: RemediationState,
    /// Milliseconds since the machine was created
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal state transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: RemediationState,
    pub to: RemediationState,
}

/// Tracks the current state of one run and logs every transition
#[derive(Debug)]
pub struct RemediationStateMachine {
    current: RemediationState,
    max_attempts: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl RemediationStateMachine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            current: RemediationState::Received,
            max_attempts,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RemediationState {
        self.current
    }

    /// Attempt currently running, or the last one run
    pub fn attempts(&self) -> u32 {
        self.transitions
            .iter()
            .filter_map(|t| match t.to {
                RemediationState::Attempting(n) => Some(n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn advance(
        &mut self,
        to: RemediationState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to, self.max_attempts) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }
        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RemediationState::*;

    #[test]
    fn test_happy_path() {
        let mut sm = RemediationStateMachine::new(2);
        sm.advance(Classified, Some("Conflict")).unwrap();
        sm.advance(PlaybookSelected, None).unwrap();
        sm.advance(Attempting(1), None).unwrap();
        sm.advance(Succeeded, None).unwrap();

        assert!(sm.current().is_terminal());
        assert_eq!(sm.attempts(), 1);
        assert_eq!(sm.transitions().len(), 4);
        assert_eq!(sm.transitions()[0].reason.as_deref(), Some("Conflict"));
    }

    #[test]
    fn test_attempts_cannot_pass_bound() {
        let mut sm = RemediationStateMachine::new(2);
        sm.advance(Classified, None).unwrap();
        sm.advance(PlaybookSelected, None).unwrap();
        sm.advance(Attempting(1), None).unwrap();
        sm.advance(Attempting(2), None).unwrap();

        let err = sm.advance(Attempting(3), None).unwrap_err();
        assert_eq!(err.from, Attempting(2));
        assert_eq!(err.to.to_string(), "Attempting(3)");
        sm.advance(Escalated, None).unwrap();
        assert_eq!(sm.attempts(), 2);
    }

    #[test]
    fn test_attempts_cannot_skip() {
        let mut sm = RemediationStateMachine::new(5);
        sm.advance(Classified, None).unwrap();
        sm.advance(PlaybookSelected, None).unwrap();
        assert!(sm.advance(Attempting(2), None).is_err());
        sm.advance(Attempting(1), None).unwrap();
        assert!(sm.advance(Attempting(3), None).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut sm = RemediationStateMachine::new(1);
        sm.advance(Classified, None).unwrap();
        sm.advance(Escalated, Some("disabled")).unwrap();
        assert!(sm.advance(PlaybookSelected, None).is_err());
        assert!(sm.advance(Succeeded, None).is_err());
        assert_eq!(sm.attempts(), 0);
    }

    #[test]
    fn test_received_must_classify_first() {
        let mut sm = RemediationStateMachine::new(2);
        assert!(sm.advance(PlaybookSelected, None).is_err());
        assert!(sm.advance(Escalated, None).is_err());
        assert_eq!(sm.current(), Received);
    }

    #[test]
    fn test_state_json() {
        assert_eq!(serde_json::to_value(Attempting(2)).unwrap(), serde_json::json!({"attempting": 2}));
        assert_eq!(serde_json::to_value(Escalated).unwrap(), "escalated");
    }
}
