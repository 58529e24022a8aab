use std::collections::BTreeMap;

use tokio::sync::mpsc;

use crate::error::{BehaviorError, ValidationError};
use crate::exceptions::ExceptionsHandle;
use crate::hatch::{HatchPlan, HatchRate, Hatcher, Population};
use crate::stats::StatsHandle;
use crate::user::SpecRegistry;

use super::options::RunnerOptions;
use super::state::{RunnerState, StateCell};

/// Runs every virtual user in this process; no message channel involved.
#[derive(Debug)]
pub struct LocalRunner {
    hatcher: Hatcher,
    stats: StatsHandle,
    exceptions: ExceptionsHandle,
    state: StateCell,
    fatal_rx: mpsc::UnboundedReceiver<BehaviorError>,
}

impl LocalRunner {
    #[must_use]
    pub fn new(registry: SpecRegistry, options: RunnerOptions) -> Self {
        let stats = StatsHandle::new();
        let exceptions = ExceptionsHandle::new();
        let state = StateCell::default();
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let hatcher = Hatcher::new(
            registry,
            stats.clone(),
            exceptions.clone(),
            state.clone(),
            fatal_tx,
        )
        .with_catch_failures(options.catch_failures);
        Self {
            hatcher,
            stats,
            exceptions,
            state,
            fatal_rx,
        }
    }

    /// Starts converging towards `population`; the spawns continue in the
    /// background, see [`LocalRunner::join_hatch`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid command; nothing is changed
    /// in that case.
    pub async fn start_hatching(
        &mut self,
        population: &Population,
        rate: Option<&HatchRate>,
    ) -> Result<HatchPlan, ValidationError> {
        self.hatcher.start(population, rate).await
    }

    /// Re-hatches to `total` users keeping the current spec mix.
    ///
    /// # Errors
    ///
    /// Same as [`LocalRunner::start_hatching`].
    pub async fn rescale(
        &mut self,
        total: u64,
        rate: Option<&HatchRate>,
    ) -> Result<HatchPlan, ValidationError> {
        self.hatcher.rescale(total, rate).await
    }

    pub async fn join_hatch(&mut self) {
        self.hatcher.join().await;
    }

    /// Cancels pending spawns and stops all users.
    pub async fn stop(&mut self) {
        self.state.set(RunnerState::Stopping);
        self.hatcher.stop_all().await;
        self.state.set(RunnerState::Stopped);
    }

    /// Next fatal error from a virtual user (catching disabled or an
    /// uncaught interrupt).
    pub async fn next_user_error(&mut self) -> Option<BehaviorError> {
        self.fatal_rx.recv().await
    }

    pub fn try_next_user_error(&mut self) -> Option<BehaviorError> {
        self.fatal_rx.try_recv().ok()
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state.get()
    }

    #[must_use]
    pub const fn state_cell(&self) -> &StateCell {
        &self.state
    }

    #[must_use]
    pub fn user_count(&self) -> u64 {
        self.hatcher.user_count()
    }

    #[must_use]
    pub fn user_counts(&self) -> BTreeMap<String, u64> {
        self.hatcher.user_counts()
    }

    #[must_use]
    pub const fn hatcher(&self) -> &Hatcher {
        &self.hatcher
    }

    #[must_use]
    pub const fn stats(&self) -> &StatsHandle {
        &self.stats
    }

    #[must_use]
    pub const fn exceptions(&self) -> &ExceptionsHandle {
        &self.exceptions
    }
}
