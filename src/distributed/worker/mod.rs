//! Worker role: runs the users the coordinator asks for and reports back.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, BehaviorError, DistributedError};
use crate::exceptions::{ExceptionReport, ExceptionsHandle};
use crate::hatch::Hatcher;
use crate::runner::{RunnerState, StateCell, WorkerOptions};
use crate::shutdown::ShutdownReceiver;
use crate::stats::StatsHandle;
use crate::user::SpecRegistry;

use super::channel::MessageChannel;
use super::protocol::{Envelope, HeartbeatPayload, Message, StatsPayload};

/// What the run loop should do after an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerControl {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct Worker<C> {
    channel: C,
    options: WorkerOptions,
    hatcher: Hatcher,
    stats: StatsHandle,
    exceptions: ExceptionsHandle,
    state: StateCell,
    fatal_rx: mpsc::UnboundedReceiver<BehaviorError>,
}

impl<C> Worker<C>
where
    C: MessageChannel,
{
    #[must_use]
    pub fn new(channel: C, registry: SpecRegistry, options: WorkerOptions) -> Self {
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
        .with_catch_failures(options.runner.catch_failures);
        Self {
            channel,
            options,
            hatcher,
            stats,
            exceptions,
            state,
            fatal_rx,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.options.node_id
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state.get()
    }

    #[must_use]
    pub fn user_count(&self) -> u64 {
        self.hatcher.user_count()
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

    fn send(&self, message: Message) -> Result<(), DistributedError> {
        let envelope = message.into_envelope(Some(self.options.node_id.clone()))?;
        self.channel.send(envelope)
    }

    /// Registers with the coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is closed.
    pub fn announce(&self) -> Result<(), DistributedError> {
        self.send(Message::ClientReady)
    }

    /// Sends everything accumulated since the previous report, then clears
    /// it so nothing is sent twice.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is closed; the report is lost.
    pub fn report(&self) -> Result<(), DistributedError> {
        let report = self.stats.take_report();
        let errors = self.exceptions.take();
        self.send(Message::Stats(Box::new(StatsPayload {
            stats: report.stats,
            stats_total: report.stats_total,
            errors,
            user_count: self.user_count(),
            request_errors: report.request_errors,
        })))
    }

    /// Sends the live user count and state.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is closed.
    pub fn heartbeat(&self) -> Result<(), DistributedError> {
        self.send(Message::Heartbeat(HeartbeatPayload {
            user_count: self.user_count(),
            state: self.state.get(),
        }))
    }

    /// Forwards a fatal user error as a standalone `exception` envelope.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is closed.
    pub fn report_fatal(&self, error: &BehaviorError) -> Result<(), DistributedError> {
        let failure = error.to_failure();
        self.send(Message::Exception(ExceptionReport {
            class: failure.class,
            message: failure.message,
            trace: failure.trace,
            count: 1,
            nodes: BTreeSet::new(),
        }))
    }

    /// Applies one envelope from the coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error when a reply cannot be sent.
    pub async fn handle_envelope(
        &mut self,
        envelope: Envelope,
    ) -> Result<WorkerControl, DistributedError> {
        let message = match envelope.decode() {
            Ok(message) => message,
            Err(err) => {
                warn!("Dropping envelope: {}", err);
                return Ok(WorkerControl::Continue);
            }
        };
        match message {
            Message::Hatch(payload) => {
                match self
                    .hatcher
                    .start(&payload.count, payload.rate.as_ref())
                    .await
                {
                    Ok(plan) => debug!(
                        "Hatch accepted: {} to spawn, {} to stop",
                        plan.total_spawns(),
                        plan.total_stops()
                    ),
                    Err(err) => warn!("Rejected hatch command: {}", err),
                }
                Ok(WorkerControl::Continue)
            }
            Message::ClientStop => {
                info!("Coordinator asked to stop users");
                self.state.set(RunnerState::Stopping);
                self.hatcher.stop_all().await;
                self.state.set(RunnerState::Stopped);
                self.heartbeat()?;
                Ok(WorkerControl::Continue)
            }
            Message::Quit => {
                info!("Coordinator asked to quit");
                Ok(WorkerControl::Quit)
            }
            Message::ClientReady
            | Message::Stats(_)
            | Message::Exception(_)
            | Message::Heartbeat(_) => {
                warn!("Ignoring {:?} envelope from coordinator", message.kind());
                Ok(WorkerControl::Continue)
            }
        }
    }

    /// Announces itself, then serves hatch commands and sends periodic
    /// reports and heartbeats until told to quit or shut down. Always stops
    /// its users and says `quit` on the way out; the final report and `quit`
    /// are flushed before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel fails.
    pub async fn run(&mut self, mut shutdown_rx: ShutdownReceiver) -> AppResult<()> {
        self.announce()?;
        info!("Worker {} ready", self.options.node_id);

        let mut report_interval = tokio::time::interval(self.options.report_interval);
        report_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat_interval = tokio::time::interval(self.options.heartbeat_interval);
        heartbeat_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                received = self.channel.recv() => {
                    let envelope = match received {
                        Ok(envelope) => envelope,
                        Err(err) => break Err(AppError::distributed(err)),
                    };
                    match self.handle_envelope(envelope).await {
                        Ok(WorkerControl::Continue) => {}
                        Ok(WorkerControl::Quit) => break Ok(()),
                        Err(err) => break Err(AppError::distributed(err)),
                    }
                }
                _ = report_interval.tick() => {
                    if let Err(err) = self.report() {
                        break Err(AppError::distributed(err));
                    }
                }
                _ = heartbeat_interval.tick() => {
                    if let Err(err) = self.heartbeat() {
                        break Err(AppError::distributed(err));
                    }
                }
                Some(fatal) = self.fatal_rx.recv() => {
                    if let Err(err) = self.report_fatal(&fatal) {
                        break Err(AppError::distributed(err));
                    }
                }
            }
        };

        self.state.set(RunnerState::Stopping);
        self.hatcher.stop_all().await;
        self.state.set(RunnerState::Stopped);
        if let Err(err) = self.report().and_then(|()| self.send(Message::Quit)) {
            debug!("Could not say goodbye to coordinator: {}", err);
        }
        self.channel.close().await;
        info!("Worker {} stopped", self.options.node_id);
        result
    }
}
