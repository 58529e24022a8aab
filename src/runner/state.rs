use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle shared by every runner role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Ready,
    Hatching,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunnerState::Ready => "ready",
            RunnerState::Hatching => "hatching",
            RunnerState::Running => "running",
            RunnerState::Stopping => "stopping",
            RunnerState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Cloneable, observable runner state.
#[derive(Debug, Clone)]
pub struct StateCell {
    sender: Arc<watch::Sender<RunnerState>>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(RunnerState::Ready)
    }
}

impl StateCell {
    #[must_use]
    pub fn new(initial: RunnerState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    #[must_use]
    pub fn get(&self) -> RunnerState {
        *self.sender.borrow()
    }

    pub fn set(&self, state: RunnerState) {
        self.sender.send_replace(state);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.sender.subscribe()
    }

    /// Resolves once the state equals `expected`.
    pub async fn wait_for(&self, expected: RunnerState) {
        let mut receiver = self.subscribe();
        if receiver.wait_for(|state| *state == expected).await.is_err() {
            tracing::debug!("State channel closed while waiting for {}", expected);
        }
    }
}
