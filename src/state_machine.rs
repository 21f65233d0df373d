//! Workflow state machine: Camera → Loading → Review → Result, with Loading
//! falling back to its predecessor on failure and explicit reset back to
//! Camera. Exactly one state is active at a time; it governs which UI
//! surface is shown and which gateway call may be pending.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// All states in the capture-to-query flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkflowState {
    /// Live viewfinder; the capture trigger is armed.
    Camera,
    /// A check sequence is in flight; the trigger is disabled.
    Loading,
    /// Corrected title shown for human editing before the price search.
    Review,
    /// Terminal state showing the quoted price.
    Result,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Camera => write!(f, "Camera"),
            WorkflowState::Loading => write!(f, "Loading"),
            WorkflowState::Review => write!(f, "Review"),
            WorkflowState::Result => write!(f, "Result"),
        }
    }
}

impl WorkflowState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        matches!(
            (self, next),
            (WorkflowState::Camera, WorkflowState::Loading)
                | (WorkflowState::Loading, WorkflowState::Review)
                | (WorkflowState::Loading, WorkflowState::Result)
                | (WorkflowState::Loading, WorkflowState::Camera) // failure fallback
                | (WorkflowState::Review, WorkflowState::Loading) // price search
                | (WorkflowState::Review, WorkflowState::Camera) // reset
                | (WorkflowState::Result, WorkflowState::Camera) // reset
        )
    }
}

/// Thread-safe state holder with a watch channel for reactive subscribers.
pub struct StateMachine {
    state: RwLock<WorkflowState>,
    state_tx: watch::Sender<WorkflowState>,
    state_rx: watch::Receiver<WorkflowState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(WorkflowState::Camera);
        Self {
            state: RwLock::new(WorkflowState::Camera),
            state_tx,
            state_rx,
        }
    }

    /// Current state (non-blocking read).
    pub fn current(&self) -> WorkflowState {
        *self.state.read()
    }

    /// Attempt a state transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&self, next: WorkflowState) -> Result<WorkflowState, String> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {} -> {}", current, next);
            warn!("{}", msg);
            return Err(msg);
        }
        *state = next;
        let _ = self.state_tx.send(next);
        info!(from = %current, to = %next, "state_transition");
        Ok(next)
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_rx.clone()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkflowState::*;

    #[test]
    fn happy_path_edges_are_valid() {
        for (from, to) in [
            (Camera, Loading),
            (Loading, Review),
            (Review, Loading),
            (Loading, Result),
            (Result, Camera),
        ] {
            assert!(from.can_transition_to(to), "{from} -> {to}");
        }
    }

    #[test]
    fn loading_falls_back_to_camera_on_failure() {
        assert!(Loading.can_transition_to(Camera));
    }

    #[test]
    fn review_and_result_reset_to_camera() {
        assert!(Review.can_transition_to(Camera));
        assert!(Result.can_transition_to(Camera));
    }

    #[test]
    fn skipping_loading_is_rejected() {
        assert!(!Camera.can_transition_to(Review));
        assert!(!Camera.can_transition_to(Result));
        assert!(!Result.can_transition_to(Review));
        assert!(!Review.can_transition_to(Result));
    }

    #[test]
    fn machine_rejects_invalid_and_applies_valid() {
        let machine = StateMachine::new();
        assert_eq!(machine.current(), Camera);
        assert!(machine.transition(Result).is_err());
        assert_eq!(machine.current(), Camera);

        machine.transition(Loading).unwrap();
        machine.transition(Review).unwrap();
        machine.transition(Loading).unwrap();
        machine.transition(Result).unwrap();
        machine.transition(Camera).unwrap();
        assert_eq!(machine.current(), Camera);
    }

    #[test]
    fn subscribers_observe_transitions() {
        let machine = StateMachine::new();
        let rx = machine.subscribe();
        machine.transition(Loading).unwrap();
        assert_eq!(*rx.borrow(), Loading);
    }
}
