//! The lifecycle state machine shared by all three orchestrators:
//!
//! ```text
//! Uninitialized ──Initialize──► Initialized
//! Initialized   ──Configure──► Configured   (idempotent, may repeat)
//! Configured    ──Prepare────► Prepared
//! Prepared      ──Start──────► Running
//! Running       ──Stop───────► Stopped (terminal for this instance)
//! ```

use crate::error::OrchestratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    Initialized,
    Configured,
    Prepared,
    Running,
    Stopped,
}

impl OrchestratorState {
    fn label(self) -> &'static str {
        match self {
            OrchestratorState::Uninitialized => "Uninitialized",
            OrchestratorState::Initialized => "Initialized",
            OrchestratorState::Configured => "Configured",
            OrchestratorState::Prepared => "Prepared",
            OrchestratorState::Running => "Running",
            OrchestratorState::Stopped => "Stopped",
        }
    }
}

/// Require `state` to be exactly `expected`, or error naming `op`.
pub fn require(state: OrchestratorState, expected: OrchestratorState, op: &'static str) -> Result<(), OrchestratorError> {
    if state == expected {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidTransition { from: state.label(), op })
    }
}

/// Require `state` to be one of `expected`, or error naming `op`. Used by
/// `Configure` (repeatable from `Initialized` or `Configured`) and the
/// idempotent `Start`/`Stop` transitions.
pub fn require_one_of(state: OrchestratorState, expected: &[OrchestratorState], op: &'static str) -> Result<(), OrchestratorError> {
    if expected.contains(&state) {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidTransition { from: state.label(), op })
    }
}
