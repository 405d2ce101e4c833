//! Pipeline lifecycle state

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of one pipeline run. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Configured, nothing started
    Idle,
    /// Capturing and flushing
    Running,
    /// Capture stopped; buffered records are being flushed
    Draining,
    Stopped,
}

impl PipelineState {
    /// Whether `next` may follow `self`
    pub fn can_become(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Running) | (Running, Draining) | (Draining, Stopped)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Running => write!(f, "running"),
            PipelineState::Draining => write!(f, "draining"),
            PipelineState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Shared, thread-safe pipeline state
#[derive(Debug, Clone)]
pub struct StateCell {
    inner: Arc<RwLock<PipelineState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(PipelineState::Idle)),
        }
    }

    pub fn get(&self) -> PipelineState {
        *self.inner.read()
    }

    /// Move to `next` if that is a legal step from the current state
    ///
    /// Returns whether the state changed. Repeating a transition that
    /// already happened is a no-op.
    pub fn advance(&self, next: PipelineState) -> bool {
        let mut state = self.inner.write();
        if state.can_become(next) {
            debug!(from = %*state, to = %next, "Pipeline state change");
            *state = next;
            true
        } else {
            false
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let state = StateCell::new();
        assert_eq!(state.get(), PipelineState::Idle);

        assert!(state.advance(PipelineState::Running));
        assert!(state.advance(PipelineState::Draining));
        assert!(!state.advance(PipelineState::Draining));
        assert!(state.advance(PipelineState::Stopped));
        assert_eq!(state.get(), PipelineState::Stopped);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let state = StateCell::new();
        state.advance(PipelineState::Running);
        state.advance(PipelineState::Draining);
        assert!(state.advance(PipelineState::Stopped));

        assert!(!state.advance(PipelineState::Running));
        assert!(!state.advance(PipelineState::Draining));
        assert!(!state.advance(PipelineState::Idle));
        assert_eq!(state.get(), PipelineState::Stopped);
    }

    #[test]
    fn test_cannot_skip_running() {
        let state = StateCell::new();
        assert!(!state.advance(PipelineState::Draining));
        assert!(!state.advance(PipelineState::Stopped));
        assert_eq!(state.get(), PipelineState::Idle);
    }

    #[test]
    fn test_clones_share_state() {
        let state = StateCell::new();
        let other = state.clone();
        state.advance(PipelineState::Running);
        assert_eq!(other.get(), PipelineState::Running);
        assert_eq!(other.get().to_string(), "running");
    }
}
