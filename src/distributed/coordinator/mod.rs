//! Coordinator role: tracks workers, fans hatch commands out and merges what
//! the workers report.
mod table;


use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, DistributedError, ValidationError};
use crate::exceptions::{ExceptionStore, ExceptionsHandle};
use crate::hatch::{
    HatchRate, Population, Rates, Targets, proportional_targets, resolve_population,
    resolve_rates, split_total,
};
use crate::runner::{CoordinatorOptions, RunnerState, StateCell};
use crate::shutdown::ShutdownReceiver;
use crate::stats::{StatsHandle, StatsReport};
use crate::user::SpecRegistry;

use super::channel::MessageChannel;
use super::protocol::{Envelope, HatchPayload, Message, StatsPayload};

pub use table::{WorkerRecord, WorkerTable};

/// Never runs users itself; partitions targets across the known workers.
#[derive(Debug)]
pub struct Coordinator<C> {
    channel: C,
    registry: SpecRegistry,
    options: CoordinatorOptions,
    workers: WorkerTable,
    missing: BTreeSet<String>,
    stats: StatsHandle,
    exceptions: ExceptionsHandle,
    fatal_errors: ExceptionStore,
    state: StateCell,
    targets: Targets,
    rates: Rates,
}

impl<C> Coordinator<C>
where
    C: MessageChannel,
{
    #[must_use]
    pub fn new(channel: C, registry: SpecRegistry, options: CoordinatorOptions) -> Self {
        let targets = registry.names().map(|name| (name.to_owned(), 0)).collect();
        Self {
            channel,
            registry,
            options,
            workers: WorkerTable::default(),
            missing: BTreeSet::new(),
            stats: StatsHandle::new(),
            exceptions: ExceptionsHandle::new(),
            fatal_errors: ExceptionStore::default(),
            state: StateCell::default(),
            targets,
            rates: Rates::new(),
        }
    }

    #[must_use]
    pub const fn workers(&self) -> &WorkerTable {
        &self.workers
    }

    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers dropped for silence and not re-registered since.
    #[must_use]
    pub const fn missing_workers(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Sum of the user counts last reported by every known worker.
    #[must_use]
    pub fn user_count(&self) -> u64 {
        self.workers.user_count()
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
    pub const fn stats(&self) -> &StatsHandle {
        &self.stats
    }

    #[must_use]
    pub const fn exceptions(&self) -> &ExceptionsHandle {
        &self.exceptions
    }

    /// Fatal user errors reported by workers through `exception` envelopes,
    /// deduplicated like the exception store but kept out of it.
    #[must_use]
    pub const fn fatal_errors(&self) -> &ExceptionStore {
        &self.fatal_errors
    }

    #[must_use]
    pub const fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Applies one inbound envelope. Malformed envelopes and reports from
    /// unknown workers are logged and dropped.
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        let message = match envelope.decode() {
            Ok(message) => message,
            Err(err) => {
                warn!("Dropping envelope: {}", err);
                return;
            }
        };
        let Some(node_id) = envelope.node_id else {
            warn!("Dropping {:?} envelope without node id", message.kind());
            return;
        };
        let now = Instant::now();

        match message {
            Message::ClientReady => {
                self.workers.insert(&node_id, now);
                self.missing.remove(&node_id);
                info!(
                    "Worker {} ready ({} connected)",
                    node_id,
                    self.workers.len()
                );
            }
            Message::Quit => {
                if self.workers.remove(&node_id).is_some() {
                    info!(
                        "Worker {} quit ({} connected)",
                        node_id,
                        self.workers.len()
                    );
                }
            }
            Message::Stats(payload) => self.merge_stats(&node_id, *payload, now),
            Message::Exception(report) => {
                if self.touch(&node_id, now).is_none() {
                    return;
                }
                error!(
                    "Worker {} lost a user: {}: {}",
                    node_id, report.class, report.message
                );
                self.fatal_errors.merge(&[report], Some(node_id.as_str()));
            }
            Message::Heartbeat(payload) => {
                if let Some(record) = self.touch(&node_id, now) {
                    record.state = payload.state;
                    record.reported_user_count = payload.user_count;
                }
            }
            Message::Hatch(_) | Message::ClientStop => {
                warn!(
                    "Ignoring {:?} envelope from worker {}",
                    message.kind(),
                    node_id
                );
            }
        }
    }

    fn touch(&mut self, node_id: &str, now: Instant) -> Option<&mut WorkerRecord> {
        let record = self.workers.get_mut(node_id);
        match record {
            Some(record) => {
                record.last_report_time = now;
                Some(record)
            }
            None => {
                warn!("Discarding report from unknown worker {}", node_id);
                None
            }
        }
    }

    fn merge_stats(&mut self, node_id: &str, payload: StatsPayload, now: Instant) {
        let Some(record) = self.touch(node_id, now) else {
            return;
        };
        record.reported_user_count = payload.user_count;
        let StatsPayload {
            stats,
            stats_total,
            errors,
            request_errors,
            ..
        } = payload;
        self.stats.merge(&StatsReport {
            stats,
            stats_total,
            request_errors,
        });
        self.exceptions.merge(&errors, Some(node_id));
        debug!("Merged stats from worker {}", node_id);
    }

    /// Waits for one inbound envelope and applies it.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is closed.
    pub async fn recv_next(&mut self) -> Result<(), DistributedError> {
        let envelope = self.channel.recv().await?;
        self.handle_envelope(envelope);
        Ok(())
    }

    /// Processes envelopes until `expected` workers are registered.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or when the channel closes.
    pub async fn wait_for_workers(
        &mut self,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), DistributedError> {
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(Instant::now);
        while self.workers.len() < expected {
            match tokio::time::timeout_at(deadline, self.recv_next()).await {
                Ok(result) => result?,
                Err(_elapsed) => {
                    return Err(DistributedError::WorkerWaitTimeout {
                        expected,
                        actual: self.workers.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Splits the requested population across the known workers and sends
    /// exactly one `hatch` envelope to each.
    ///
    /// Every spec's count is split with equal weight per worker (remainder to
    /// the earliest connected) and its rate divided by the worker count.
    /// Returns the number of envelopes sent.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative or unknown targets, invalid
    /// rates, or a spec to hatch without any rate. Nothing is sent then.
    pub fn start_hatching(
        &mut self,
        population: &Population,
        rate: Option<&HatchRate>,
    ) -> Result<usize, ValidationError> {
        let targets = resolve_population(&self.registry, population)?;
        let rates = match rate {
            Some(rate) => resolve_rates(&self.registry, rate)?,
            None => self.rates.clone(),
        };
        for (name, target) in &targets {
            if *target > 0 && !rates.contains_key(name) {
                return Err(ValidationError::MissingHatchRate { spec: name.clone() });
            }
        }
        self.targets = targets;
        self.rates = rates;
        self.state.set(RunnerState::Hatching);

        let worker_ids = self.workers.ids();
        if worker_ids.is_empty() {
            warn!("No workers connected; hatch request recorded but not sent");
        }
        let equal_weights = vec![1u64; worker_ids.len()];
        let worker_share = worker_ids.len().max(1) as f64;
        let count_splits: BTreeMap<&str, Vec<u64>> = self
            .targets
            .iter()
            .map(|(name, count)| (name.as_str(), split_total(*count, &equal_weights)))
            .collect();

        let mut sent = 0usize;
        for (idx, worker_id) in worker_ids.iter().enumerate() {
            let count: BTreeMap<String, i64> = count_splits
                .iter()
                .map(|(name, shares)| {
                    let share = shares.get(idx).copied().unwrap_or(0);
                    ((*name).to_owned(), i64::try_from(share).unwrap_or(i64::MAX))
                })
                .collect();
            let rate: BTreeMap<String, f64> = self
                .rates
                .iter()
                .map(|(name, rate)| (name.clone(), rate / worker_share))
                .collect();
            let payload = HatchPayload {
                count: Population::PerSpec(count),
                rate: Some(HatchRate::PerSpec(rate)),
            };
            if self.send_to(worker_id, Message::Hatch(payload)) {
                sent = sent.saturating_add(1);
            }
            if let Some(record) = self.workers.get_mut(worker_id) {
                record.state = RunnerState::Hatching;
            }
        }
        info!(
            "Sent hatch for {} users to {} workers",
            self.targets.values().fold(0u64, |acc, n| acc.saturating_add(*n)),
            sent
        );
        self.state.set(RunnerState::Running);
        Ok(sent)
    }

    /// Re-hatches to `total` users keeping the current spec mix.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::start_hatching`].
    pub fn rescale(&mut self, total: u64, rate: Option<&HatchRate>) -> Result<usize, ValidationError> {
        let targets = proportional_targets(&self.registry, &self.targets, total);
        let population = Population::PerSpec(
            targets
                .into_iter()
                .map(|(name, count)| (name, i64::try_from(count).unwrap_or(i64::MAX)))
                .collect(),
        );
        self.start_hatching(&population, rate)
    }

    fn send_to(&self, worker_id: &str, message: Message) -> bool {
        let kind = message.kind();
        let result = message
            .into_envelope(Some(worker_id.to_owned()))
            .and_then(|envelope| self.channel.send(envelope));
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to send {:?} to worker {}: {}", kind, worker_id, err);
                false
            }
        }
    }

    /// Tells every worker to stop its users.
    pub fn stop(&mut self) {
        self.state.set(RunnerState::Stopping);
        for worker_id in self.workers.ids() {
            self.send_to(&worker_id, Message::ClientStop);
        }
        for record in self.workers.iter_mut() {
            record.state = RunnerState::Stopping;
        }
        for target in self.targets.values_mut() {
            *target = 0;
        }
        self.state.set(RunnerState::Stopped);
    }

    /// Sends `quit` to every worker, forgets them and closes the channel once
    /// the `quit` envelopes are delivered.
    pub async fn shutdown(&mut self) {
        self.quit();
        self.channel.close().await;
    }

    /// Tells every worker to quit and forgets them.
    pub fn quit(&mut self) {
        for worker_id in self.workers.ids() {
            self.send_to(&worker_id, Message::Quit);
        }
        self.workers.clear();
        self.state.set(RunnerState::Stopped);
    }

    /// Drops workers silent for longer than the heartbeat timeout. Their user
    /// counts stop contributing; already merged stats stay.
    pub fn reap_silent_workers(&mut self, now: Instant) -> Vec<String> {
        let reaped = self.workers.reap(now, self.options.heartbeat_timeout);
        reaped
            .into_iter()
            .map(|record| {
                warn!(
                    "Worker {} missed its heartbeat window; dropping {} users from totals",
                    record.id, record.reported_user_count
                );
                self.missing.insert(record.id.clone());
                record.id
            })
            .collect()
    }

    /// Serves workers until shutdown, then sends `quit` to all of them and
    /// waits for it to be delivered.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel closes.
    pub async fn run(&mut self, mut shutdown_rx: ShutdownReceiver) -> AppResult<()> {
        let reap_every = self
            .options
            .heartbeat_timeout
            .checked_div(2)
            .unwrap_or_default()
            .max(Duration::from_millis(100));
        let mut reap_interval = tokio::time::interval(reap_every);
        reap_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                received = self.channel.recv() => match received {
                    Ok(envelope) => self.handle_envelope(envelope),
                    Err(err) => break Err(AppError::distributed(err)),
                },
                _ = reap_interval.tick() => {
                    self.reap_silent_workers(Instant::now());
                }
            }
        };

        info!("Coordinator shutting down; {} workers told to quit", self.workers.len());
        self.shutdown().await;
        result
    }
}
