//! State machine tracking one dataset-version release
//!
//! States advance strictly in order. Once `Persisted` is reached the release
//! is durable, and a later failure leaves a partial state.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::error::PublishError;

/// Release state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    Draft,
    Validating,
    IdentifierEnsured,
    Versioned,
    FilesCascaded,
    Exported,
    Persisted,
    IdentifierPublicized,
    Indexed,
    Failed,
}

impl ReleaseState {
    /// The state that must follow this one on the success path
    pub fn next(self) -> Option<ReleaseState> {
        use ReleaseState::*;
        match self {
            Draft => Some(Validating),
            Validating => Some(IdentifierEnsured),
            IdentifierEnsured => Some(Versioned),
            Versioned => Some(FilesCascaded),
            FilesCascaded => Some(Exported),
            Exported => Some(Persisted),
            Persisted => Some(IdentifierPublicized),
            IdentifierPublicized => Some(Indexed),
            Indexed | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReleaseState::Indexed | ReleaseState::Failed)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: ReleaseState,
    pub to: ReleaseState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Snapshot of the state machine, suitable for reporting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStateData {
    pub current_state: ReleaseState,
    pub transitions: Vec<StateTransition>,
    /// Whether the release reached `Persisted`
    pub durable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State machine for one release
#[derive(Debug, Clone)]
pub struct ReleaseStateMachine {
    current_state: ReleaseState,
    transitions: Vec<StateTransition>,
    durable: bool,
    error: Option<String>,
}

impl Default for ReleaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: ReleaseState::Draft,
            transitions: Vec::new(),
            durable: false,
            error: None,
        }
    }

    /// Advance to the next state on the success path
    pub fn advance(&mut self, to: ReleaseState, detail: Option<String>) -> Result<(), PublishError> {
        if self.current_state.next() != Some(to) {
            return Err(PublishError::InvalidTransition {
                from: self.current_state,
                to,
            });
        }

        self.record(to, detail);
        if to == ReleaseState::Persisted {
            self.durable = true;
        }
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.current_state.is_terminal() {
            return;
        }
        let error = error.into();
        self.record(ReleaseState::Failed, Some(error.clone()));
        self.error = Some(error);
    }

    fn record(&mut self, to: ReleaseState, detail: Option<String>) {
        debug!("Release state {:?} -> {:?}", self.current_state, to);
        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            detail,
        });
        self.current_state = to;
    }

    pub fn get_state(&self) -> ReleaseState {
        self.current_state
    }

    /// True once the release has been persisted, even if it later failed
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn get_state_data(&self) -> ReleaseStateData {
        ReleaseStateData {
            current_state: self.current_state,
            transitions: self.transitions.clone(),
            durable: self.durable,
            error: self.error.clone(),
        }
    }

    pub fn get_last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Milliseconds between the first and the last transition
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Transition history as human-readable lines
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let detail = t
                    .detail
                    .as_ref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                format!("{}: {:?} → {:?}{}", t.timestamp.to_rfc3339(), t.from, t.to, detail)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
