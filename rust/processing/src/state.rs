// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run lifecycle.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pipeline state.
///
/// `Idle → Indexing → Detecting → Prescribing → Completed`; `Cancelled` and
/// `Failed` are reachable from any in-progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Indexing,
    Detecting,
    Prescribing,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled | RunState::Failed)
    }

    pub const fn is_in_progress(self) -> bool {
        matches!(self, RunState::Indexing | RunState::Detecting | RunState::Prescribing)
    }

    pub fn can_transition(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Indexing)
            | (Indexing, Detecting)
            | (Detecting, Prescribing)
            | (Prescribing, Completed) => true,
            (from, Cancelled | Failed) => from.is_in_progress(),
            _ => false,
        }
    }

    /// Progress band `[start, end]` of the stage.
    pub const fn band(self) -> (f64, f64) {
        match self {
            RunState::Idle => (0.0, 0.0),
            RunState::Indexing => (0.0, 0.2),
            RunState::Detecting => (0.2, 0.6),
            RunState::Prescribing => (0.6, 1.0),
            RunState::Completed | RunState::Cancelled | RunState::Failed => (1.0, 1.0),
        }
    }
}

/// Current state plus transition checking.
#[derive(Debug)]
pub struct StateMachine {
    state: RunState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
        }
    }
}

impl StateMachine {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
        Ok(())
    }
}

/// Resource that ended a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum ResourceExceeded {
    WallClock { limit_ms: u64 },
    Memory { limit_bytes: u64, estimated_bytes: u64 },
}

/// Final status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed { reason: ResourceExceeded },
}

impl RunStatus {
    pub fn state(&self) -> RunState {
        match self {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Cancelled => RunState::Cancelled,
            RunStatus::Failed { .. } => RunState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut machine = StateMachine::default();
        for next in [
            RunState::Indexing,
            RunState::Detecting,
            RunState::Prescribing,
            RunState::Completed,
        ] {
            machine.advance(next).unwrap();
        }
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn abort_only_from_in_progress_states() {
        assert!(RunState::Detecting.can_transition(RunState::Cancelled));
        assert!(RunState::Indexing.can_transition(RunState::Failed));
        assert!(!RunState::Idle.can_transition(RunState::Failed));
        assert!(!RunState::Completed.can_transition(RunState::Cancelled));
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut machine = StateMachine::default();
        assert!(machine.advance(RunState::Detecting).is_err());
        machine.advance(RunState::Indexing).unwrap();
        assert!(machine.advance(RunState::Completed).is_err());
        assert_eq!(machine.state(), RunState::Indexing);
    }

    #[test]
    fn status_serializes_with_reason() {
        let status = RunStatus::Failed {
            reason: ResourceExceeded::WallClock { limit_ms: 1000 },
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"status":"failed","reason":{"resource":"wall_clock","limit_ms":1000}}"#
        );
    }
}
