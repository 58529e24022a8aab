use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{error, info, warn};

use crate::distributed::{Coordinator, TcpCoordinatorChannel, TcpWorkerChannel, Worker};
use crate::error::{AppError, AppResult};
use crate::runner::LocalRunner;
use crate::shutdown::{ShutdownSender, setup_signal_shutdown_handler, shutdown_channel};
use crate::stats::StatsHandle;

use super::super::summary::{print_final_report, print_stats};
use super::types::{CoordinatorPlan, LocalPlan, RunPlan, WorkerPlan};

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub(in crate::entry) async fn execute_plan(plan: RunPlan) -> AppResult<()> {
    let (shutdown_tx, _shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let result = match plan {
        RunPlan::Local(plan) => run_local(plan, &shutdown_tx).await,
        RunPlan::Coordinator(plan) => run_coordinator(plan, &shutdown_tx).await,
        RunPlan::Worker(plan) => run_worker(plan, &shutdown_tx).await,
    };

    signal_handle.abort();
    result
}

async fn run_local(plan: LocalPlan, shutdown_tx: &ShutdownSender) -> AppResult<()> {
    let mut runner = LocalRunner::new(plan.registry, plan.options);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let hatch = runner
        .start_hatching(&plan.load.users, Some(&plan.load.hatch_rate))
        .await?;
    info!(
        "Hatching {} users ({} to stop)",
        hatch.total_spawns(),
        hatch.total_stops()
    );
    arm_run_time(plan.load.run_time, shutdown_tx);
    let printer = spawn_printer(runner.stats().clone(), plan.load.print_interval);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            fatal = runner.next_user_error() => match fatal {
                Some(err) => warn!("Virtual user ended: {}", err),
                None => break,
            },
        }
    }

    printer.abort();
    runner.stop().await;
    let exceptions = runner.exceptions().serialize();
    print_final_report(runner.stats(), &exceptions);
    Ok(())
}

async fn run_coordinator(plan: CoordinatorPlan, shutdown_tx: &ShutdownSender) -> AppResult<()> {
    let channel = TcpCoordinatorChannel::bind(&plan.listen).await?;
    info!(
        "Coordinator listening on {}; waiting for {} workers",
        channel.local_addr(),
        plan.expect_workers
    );
    let mut coordinator = Coordinator::new(channel, plan.registry, plan.options);
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => {
            coordinator.shutdown().await;
            return Ok(());
        }
        waited = coordinator.wait_for_workers(plan.expect_workers, plan.expect_workers_timeout) => {
            waited?;
        }
    }

    let sent = coordinator.start_hatching(&plan.load.users, Some(&plan.load.hatch_rate))?;
    info!("Hatch sent to {} workers", sent);

    let run_rx = shutdown_tx.subscribe();
    arm_run_time(plan.load.run_time, shutdown_tx);
    let printer = spawn_printer(coordinator.stats().clone(), plan.load.print_interval);

    let result = coordinator.run(run_rx).await;
    printer.abort();

    let exceptions = coordinator.exceptions().serialize();
    print_final_report(coordinator.stats(), &exceptions);
    for fatal in coordinator.fatal_errors().iter() {
        error!(
            "Fatal user error on {:?} ({}x): {}: {}",
            fatal.nodes, fatal.count, fatal.class, fatal.message
        );
    }
    if !coordinator.missing_workers().is_empty() {
        warn!("Workers lost during the run: {:?}", coordinator.missing_workers());
    }
    result
}

async fn run_worker(plan: WorkerPlan, shutdown_tx: &ShutdownSender) -> AppResult<()> {
    let channel = connect_with_retries(&plan.join, plan.connect_retries).await?;
    let mut worker = Worker::new(channel, plan.registry, plan.options);
    info!("Worker {} joined {}", worker.node_id(), plan.join);
    worker.run(shutdown_tx.subscribe()).await
}

async fn connect_with_retries(addr: &str, attempts: u64) -> AppResult<TcpWorkerChannel> {
    let mut attempt = 1u64;
    loop {
        match TcpWorkerChannel::connect(addr).await {
            Ok(channel) => return Ok(channel),
            Err(err) if attempt < attempts => {
                warn!(
                    "Connect to {} failed (attempt {}/{}): {}",
                    addr, attempt, attempts, err
                );
                attempt = attempt.saturating_add(1);
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(err) => return Err(AppError::distributed(err)),
        }
    }
}

fn arm_run_time(run_time: Option<Duration>, shutdown_tx: &ShutdownSender) {
    let Some(run_time) = run_time else {
        return;
    };
    let shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(run_time).await;
        info!("Run time of {:?} elapsed; stopping", run_time);
        drop(shutdown_tx.send(()));
    });
}

fn spawn_printer(stats: StatsHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now().checked_add(every).unwrap_or_else(Instant::now);
        let mut ticker = interval_at(start, every);
        loop {
            ticker.tick().await;
            print_stats(&stats);
        }
    })
}
