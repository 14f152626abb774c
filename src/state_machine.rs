//! Activation state machine: Idle → ArmedAwaitingVoice → Idle (timeout) or launch.
//! A double impulse arms the system; the wake phrase confirms within the arming
//! window. The sensing loops read the current state to gate their detection.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{info, warn};

/// The two activation states. Exactly one instance exists per process,
/// owned by `StateMachine` and mutated only by the orchestrator thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationState {
    /// Amplitude sensing owns the arming decision.
    Idle,
    /// Voice sensing owns the confirmation decision; a timeout is pending.
    ArmedAwaitingVoice,
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationState::Idle => write!(f, "Idle"),
            ActivationState::ArmedAwaitingVoice => write!(f, "ArmedAwaitingVoice"),
        }
    }
}

impl ActivationState {
    /// Returns whether transitioning from `self` to `next` is valid.
    /// Arming leaves Idle; the arming timeout returns to Idle. A successful
    /// confirmation is terminal and never transitions.
    pub fn can_transition_to(self, next: ActivationState) -> bool {
        matches!(
            (self, next),
            (ActivationState::Idle, ActivationState::ArmedAwaitingVoice)
                | (ActivationState::ArmedAwaitingVoice, ActivationState::Idle)
        )
    }
}

/// Thread-safe state holder with a watch channel for reactive subscribers.
/// Sensing loops subscribe (or poll `current`) to know whether their channel
/// currently owns the arming decision.
pub struct StateMachine {
    state: RwLock<ActivationState>,
    state_tx: watch::Sender<ActivationState>,
    state_rx: watch::Receiver<ActivationState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(ActivationState::Idle);
        Self {
            state: RwLock::new(ActivationState::Idle),
            state_tx,
            state_rx,
        }
    }

    /// Current state (non-blocking read).
    pub fn current(&self) -> ActivationState {
        *self.state.read()
    }

    /// Attempt a state transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&self, next: ActivationState) -> Result<ActivationState, String> {
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
    pub fn subscribe(&self) -> watch::Receiver<ActivationState> {
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

    #[test]
    fn starts_idle() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), ActivationState::Idle);
    }

    #[test]
    fn arm_and_disarm_round_trip() {
        let sm = StateMachine::new();
        assert!(sm.transition(ActivationState::ArmedAwaitingVoice).is_ok());
        assert_eq!(sm.current(), ActivationState::ArmedAwaitingVoice);
        assert!(sm.transition(ActivationState::Idle).is_ok());
        assert_eq!(sm.current(), ActivationState::Idle);
    }

    #[test]
    fn rejects_self_transitions() {
        let sm = StateMachine::new();
        assert!(sm.transition(ActivationState::Idle).is_err());
        sm.transition(ActivationState::ArmedAwaitingVoice).unwrap();
        assert!(sm.transition(ActivationState::ArmedAwaitingVoice).is_err());
        assert_eq!(sm.current(), ActivationState::ArmedAwaitingVoice);
    }

    #[test]
    fn watch_subscribers_see_transitions() {
        let sm = StateMachine::new();
        let rx = sm.subscribe();
        assert_eq!(*rx.borrow(), ActivationState::Idle);
        sm.transition(ActivationState::ArmedAwaitingVoice).unwrap();
        assert_eq!(*rx.borrow(), ActivationState::ArmedAwaitingVoice);
    }
}
