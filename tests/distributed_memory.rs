
use std::time::Duration;

use hatchery::distributed::{Worker, memory_hub};
use hatchery::hatch::{HatchRate, Population};
use hatchery::runner::{CoordinatorOptions, RunnerState, WorkerOptions};
use hatchery::shutdown::shutdown_channel;

use support_users::{pump_until, steady_registry, total_requests, within};

const WAIT: Duration = Duration::from_secs(10);

fn worker_options(node_id: &str) -> WorkerOptions {
    let mut options = WorkerOptions::new(node_id);
    options.report_interval = Duration::from_millis(100);
    options.heartbeat_interval = Duration::from_millis(50);
    options
}

#[tokio::test(flavor = "current_thread")]
async fn coordinator_spreads_users_and_merges_stats() -> Result<(), String> {
    let (channel, hub) = memory_hub();
    let mut coordinator =
        hatchery::distributed::Coordinator::new(channel, steady_registry()?, CoordinatorOptions::default());
    let (shutdown_tx, _shutdown_rx) = shutdown_channel();

    let mut handles = Vec::new();
    for node_id in ["w1", "w2", "w3"] {
        let mut worker = Worker::new(hub.connect(node_id), steady_registry()?, worker_options(node_id));
        let shutdown_rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move { worker.run(shutdown_rx).await }));
    }

    within(WAIT, coordinator.wait_for_workers(3, WAIT))
        .await?
        .map_err(|err| format!("workers never registered: {}", err))?;
    let ids: Vec<String> = coordinator.workers().ids();
    if ids != ["w1", "w2", "w3"] {
        return Err(format!("Unexpected worker order {:?}", ids));
    }

    let sent = coordinator
        .start_hatching(&Population::Total(9), Some(&HatchRate::Uniform(90.0)))
        .map_err(|err| format!("hatch rejected: {}", err))?;
    if sent != 3 {
        return Err(format!("Expected 3 hatch envelopes, sent {}", sent));
    }
    if coordinator.targets().get("browse") != Some(&3) || coordinator.targets().get("search") != Some(&6) {
        return Err(format!("Unexpected targets {:?}", coordinator.targets()));
    }

    pump_until(&mut coordinator, WAIT, |coordinator| {
        coordinator.user_count() == 9 && total_requests(coordinator) >= 30
    })
    .await?;

    let (browse_median, search_median) = coordinator.stats().read(|stats| {
        (
            stats.get("GET", "/browse").map(|entry| entry.median_response_time()),
            stats.get("GET", "/search").map(|entry| entry.median_response_time()),
        )
    });
    if browse_median != Some(100) || search_median != Some(300) {
        return Err(format!(
            "Unexpected merged medians {:?} / {:?}",
            browse_median, search_median
        ));
    }

    coordinator.stop();
    pump_until(&mut coordinator, WAIT, |coordinator| {
        coordinator.user_count() == 0
            && coordinator
                .workers()
                .iter()
                .all(|record| record.state == RunnerState::Stopped)
    })
    .await?;

    coordinator.quit();
    for handle in handles {
        within(WAIT, handle)
            .await?
            .map_err(|err| format!("worker task panicked: {}", err))?
            .map_err(|err| format!("worker failed: {}", err))?;
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn worker_shutdown_is_seen_as_quit() -> Result<(), String> {
    let (channel, hub) = memory_hub();
    let mut coordinator =
        hatchery::distributed::Coordinator::new(channel, steady_registry()?, CoordinatorOptions::default());
    let (shutdown_tx, _shutdown_rx) = shutdown_channel();

    let mut handles = Vec::new();
    for node_id in ["w1", "w2"] {
        let mut worker = Worker::new(hub.connect(node_id), steady_registry()?, worker_options(node_id));
        let shutdown_rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move { worker.run(shutdown_rx).await }));
    }
    within(WAIT, coordinator.wait_for_workers(2, WAIT))
        .await?
        .map_err(|err| format!("workers never registered: {}", err))?;

    shutdown_tx
        .send(())
        .map_err(|err| format!("shutdown send failed: {}", err))?;
    pump_until(&mut coordinator, WAIT, |coordinator| coordinator.worker_count() == 0).await?;

    for handle in handles {
        within(WAIT, handle)
            .await?
            .map_err(|err| format!("worker task panicked: {}", err))?
            .map_err(|err| format!("worker failed: {}", err))?;
    }
    Ok(())
}
