use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use crate::error::{BehaviorError, ValidationError};
use crate::exceptions::ExceptionsHandle;
use crate::runner::{RunnerState, StateCell};
use crate::stats::StatsHandle;
use crate::user::{SpecRegistry, UserSpec};

use super::plan::{HatchPlan, plan};
use super::pool::{Spawner, UserPool};
use super::targets::{
    HatchRate, Population, Rates, Targets, proportional_targets, resolve_population,
    resolve_rates,
};

/// Converges the local virtual-user population to commanded targets.
///
/// Stops happen inline; spawns run in a background task that paces each spec
/// at `1 / rate`. A new command cancels whatever is still scheduled.
#[derive(Debug)]
pub struct Hatcher {
    registry: SpecRegistry,
    spawner: Spawner,
    state: StateCell,
    targets: Targets,
    rates: Rates,
    task: Option<JoinHandle<()>>,
}

impl Hatcher {
    #[must_use]
    pub fn new(
        registry: SpecRegistry,
        stats: StatsHandle,
        exceptions: ExceptionsHandle,
        state: StateCell,
        fatal_tx: mpsc::UnboundedSender<BehaviorError>,
    ) -> Self {
        let targets = registry.names().map(|name| (name.to_owned(), 0)).collect();
        Self {
            registry,
            spawner: Spawner {
                pool: UserPool::default(),
                stats,
                exceptions,
                catch_failures: true,
                fatal_tx,
            },
            state,
            targets,
            rates: Rates::new(),
            task: None,
        }
    }

    #[must_use]
    pub const fn with_catch_failures(mut self, catch_failures: bool) -> Self {
        self.spawner.catch_failures = catch_failures;
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    /// Most recently commanded per-spec targets.
    #[must_use]
    pub const fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Rates currently used for pacing.
    #[must_use]
    pub const fn rates(&self) -> &Rates {
        &self.rates
    }

    #[must_use]
    pub fn user_count(&self) -> u64 {
        self.spawner.pool.total()
    }

    #[must_use]
    pub fn user_counts(&self) -> std::collections::BTreeMap<String, u64> {
        self.spawner.pool.counts()
    }

    #[must_use]
    pub fn is_hatching(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Validates the command, cancels any hatch in flight, stops surplus
    /// users and schedules the paced spawns.
    ///
    /// `rate = None` keeps the previously commanded rates.
    ///
    /// # Errors
    ///
    /// Returns a validation error, before anything is changed, for negative
    /// or unknown targets, invalid rates, or a spec that must spawn users but
    /// has no rate.
    pub async fn start(
        &mut self,
        population: &Population,
        rate: Option<&HatchRate>,
    ) -> Result<HatchPlan, ValidationError> {
        let targets = resolve_population(&self.registry, population)?;
        let rates = match rate {
            Some(rate) => resolve_rates(&self.registry, rate)?,
            None => self.rates.clone(),
        };
        let live = self.spawner.pool.counts();
        for (name, target) in &targets {
            let current = live.get(name).copied().unwrap_or(0);
            if *target > current && !rates.contains_key(name) {
                return Err(ValidationError::MissingHatchRate { spec: name.clone() });
            }
        }

        self.cancel().await;
        self.targets = targets;
        self.rates = rates;
        self.state.set(RunnerState::Hatching);

        let plan = plan(&self.spawner.pool.counts(), &self.targets);
        for (name, count) in &plan.stops {
            self.spawner.pool.stop(name, *count);
        }
        info!(
            "Hatching {} users ({} to spawn, {} stopped)",
            self.targets.values().sum::<u64>(),
            plan.total_spawns(),
            plan.total_stops()
        );

        let mut schedules: Vec<(UserSpec, u64, f64)> = Vec::new();
        for (name, count) in &plan.spawns {
            if let (Some(spec), Some(rate)) = (self.registry.get(name), self.rates.get(name)) {
                schedules.push((spec.clone(), *count, *rate));
            }
        }
        let spawner = self.spawner.clone();
        let state = self.state.clone();
        self.task = Some(tokio::spawn(async move {
            let mut paced = JoinSet::new();
            for (spec, count, rate) in schedules {
                paced.spawn(pace(spawner.clone(), spec, count, rate));
            }
            while paced.join_next().await.is_some() {}
            state.set(RunnerState::Running);
            info!("All users hatched: {}", spawner.pool.total());
        }));
        Ok(plan)
    }

    /// Re-hatches to `total` users spread in proportion to the current
    /// targets.
    ///
    /// # Errors
    ///
    /// Same as [`Hatcher::start`].
    pub async fn rescale(
        &mut self,
        total: u64,
        rate: Option<&HatchRate>,
    ) -> Result<HatchPlan, ValidationError> {
        let targets = proportional_targets(&self.registry, &self.targets, total);
        let population = Population::PerSpec(
            targets
                .into_iter()
                .map(|(name, count)| (name, i64::try_from(count).unwrap_or(i64::MAX)))
                .collect(),
        );
        self.start(&population, rate).await
    }

    /// Waits for the scheduled spawns of the current hatch to finish.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
            && !err.is_cancelled()
        {
            debug!("Hatch task ended abnormally: {}", err);
        }
    }

    async fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("Cancelling hatch in progress");
            }
            task.abort();
            if let Err(err) = task.await
                && !err.is_cancelled()
            {
                debug!("Hatch task ended abnormally: {}", err);
            }
        }
    }

    /// Cancels pending spawns and stops every running user.
    pub async fn stop_all(&mut self) {
        self.cancel().await;
        self.spawner.pool.stop_all();
        for target in self.targets.values_mut() {
            *target = 0;
        }
    }
}

async fn pace(spawner: Spawner, spec: UserSpec, count: u64, rate: f64) {
    let interval = Duration::try_from_secs_f64(1.0 / rate).unwrap_or(Duration::MAX);
    for idx in 0..count {
        spawner.spawn(&spec);
        if idx.saturating_add(1) < count {
            tokio::time::sleep(interval).await;
        }
    }
    debug!("Spawned {} '{}' users", count, spec.name());
}
