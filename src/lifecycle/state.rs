//! Lifecycle state machine for one restore run
//!
//! ```text
//! Idle ─► Stopped ─► Mutating ─► MigratingSchema ─► Running ─► Bootstrapping ─► Done
//!   └──────────────────►┘  └──────────────────────────►┘  └─────────────────────►┘
//! any non-terminal state ─► Failed (absorbing)
//! ```
//!
//! The short edges are taken in local mode (no stop, no migration, no restart)
//! and when no bootstrap endpoint is configured.

use std::fmt;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{LifecycleError, LifecycleResult};

/// Where the run currently is with respect to the live deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing touched yet
    Idle,
    /// Services stopped, data not yet mutated
    Stopped,
    /// Live data is being mutated
    Mutating,
    /// External schema migration running
    MigratingSchema,
    /// Services running against restored data
    Running,
    /// Bootstrap call in progress
    Bootstrapping,
    /// Run finished and finalized
    Done,
    /// Run aborted
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "IDLE",
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Mutating => "MUTATING",
            LifecycleState::MigratingSchema => "MIGRATING_SCHEMA",
            LifecycleState::Running => "RUNNING",
            LifecycleState::Bootstrapping => "BOOTSTRAPPING",
            LifecycleState::Done => "DONE",
            LifecycleState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Done | LifecycleState::Failed)
    }

    /// Whether `self -> next` is a legal edge
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Idle, Stopped) | (Idle, Mutating) => true,
            (Stopped, Mutating) => true,
            (Mutating, MigratingSchema) | (Mutating, Running) => true,
            (MigratingSchema, Running) => true,
            (Running, Bootstrapping) | (Running, Done) => true,
            (Bootstrapping, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the run's lifecycle state and the path it took
#[derive(Debug, Clone)]
pub struct LifecycleMachine {
    state: LifecycleState,
    history: Vec<LifecycleState>,
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            history: vec![LifecycleState::Idle],
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Move to `next`, rejecting illegal edges
    pub fn transition(&mut self, next: LifecycleState) -> LifecycleResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LifecycleError::invalid_transition(format!(
                "{} -> {}",
                self.state, next
            )));
        }
        log_event_with_fields(
            Event::LifecycleTransition,
            &[("from", self.state.as_str()), ("to", next.as_str())],
        );
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `target` unless already there
    pub fn ensure(&mut self, target: LifecycleState) -> LifecycleResult<()> {
        if self.state == target {
            Ok(())
        } else {
            self.transition(target)
        }
    }

    /// Enter `Failed`. No-op once terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            let _ = self.transition(LifecycleState::Failed);
        }
    }
}
