use super::{Orchestrator, Phase, StepState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub(super) type StepStates = Arc<Mutex<HashMap<String, StepState>>>;

/// Record a step state from inside a background task
pub(super) fn record_step_state(states: &StepStates, step: &str, state: StepState) {
    states.lock().insert(step.to_string(), state);
    debug!("Step '{}' state changed to: {:?}", step, state);
}

impl Orchestrator {
    pub(super) fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
        debug!("Orchestrator phase changed to: {:?}", phase);
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Watch phase transitions, e.g. to deliver a signal only once the
    /// orchestrator is listening for it
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Get step state.
    ///
    /// States are keyed by step name, so names should be unique across the
    /// startup and shutdown lists. When two steps share a name the last state
    /// recorded wins; `Step::starting` and `Step::stopping` for one component
    /// share its name, so the shutdown state replaces the startup one.
    pub fn step_state(&self, step: &str) -> Option<StepState> {
        self.step_states.lock().get(step).copied()
    }

    /// Get all step states, keyed by step name (last writer wins)
    pub fn step_states(&self) -> HashMap<String, StepState> {
        self.step_states.lock().clone()
    }
}
