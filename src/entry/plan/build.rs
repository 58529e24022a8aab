use std::sync::Arc;

use clap::ArgMatches;
use reqwest::Client;

use crate::args::{HatcheryArgs, RoleCommand, TargetArgs, default_node_id};
use crate::behavior::{HttpTarget, RemoteOnly, build_client};
use crate::config::types::{ConfigFile, UserConfig};
use crate::error::{AppError, AppResult, ValidationError};
use crate::runner::{CoordinatorOptions, RunnerOptions, WorkerOptions};
use crate::user::{SpecRegistry, UserSpec};

use super::types::{CoordinatorPlan, LocalPlan, RunPlan, WorkerPlan};

pub(in crate::entry) fn build_plan(mut args: HatcheryArgs, matches: &ArgMatches) -> AppResult<RunPlan> {
    let config = crate::config::load_config(args.config.as_deref())?.unwrap_or_default();
    crate::config::apply_config(&mut args, matches, &config)?;

    match args.command {
        RoleCommand::Local(local) => {
            let registry = http_registry(&config, &local.target)?;
            Ok(RunPlan::Local(LocalPlan {
                registry,
                load: local.load,
                options: runner_options(&local.target),
            }))
        }
        RoleCommand::Coordinator(coordinator) => {
            let registry = remote_registry(&config.users)?;
            Ok(RunPlan::Coordinator(CoordinatorPlan {
                registry,
                load: coordinator.load,
                listen: coordinator.listen,
                expect_workers: coordinator.expect_workers.get(),
                expect_workers_timeout: coordinator.expect_workers_timeout,
                options: CoordinatorOptions {
                    heartbeat_timeout: coordinator.heartbeat_timeout,
                },
            }))
        }
        RoleCommand::Worker(worker) => {
            let join = worker
                .join
                .ok_or_else(|| AppError::validation(ValidationError::MissingJoin))?;
            let registry = http_registry(&config, &worker.target)?;
            let node_id = worker.node_id.unwrap_or_else(default_node_id);
            let mut options = WorkerOptions::new(node_id);
            options.report_interval = worker.report_interval;
            options.heartbeat_interval = worker.heartbeat_interval;
            options.runner = runner_options(&worker.target);
            Ok(RunPlan::Worker(WorkerPlan {
                registry,
                join,
                connect_retries: worker.connect_retries.get(),
                options,
            }))
        }
    }
}

const fn runner_options(target: &TargetArgs) -> RunnerOptions {
    RunnerOptions {
        catch_failures: !target.stop_on_failure,
    }
}

fn http_registry(config: &ConfigFile, target: &TargetArgs) -> AppResult<SpecRegistry> {
    if config.users.is_empty() {
        return Err(AppError::validation(ValidationError::NoUserSpecs));
    }
    let host = target
        .host
        .as_deref()
        .ok_or_else(|| AppError::validation(ValidationError::MissingHost))?;
    let client = build_client(target.request_timeout, target.connect_timeout)?;
    let specs = config
        .users
        .iter()
        .map(|user| http_spec(user, &client, host))
        .collect::<Result<Vec<_>, ValidationError>>()?;
    Ok(SpecRegistry::new(specs)?)
}

fn http_spec(user: &UserConfig, client: &Client, host: &str) -> Result<UserSpec, ValidationError> {
    let (min_wait, max_wait) = user.wait_range();
    let target = HttpTarget::new(client.clone(), user.method, host, &user.path)
        .with_wait(min_wait, max_wait)?;
    Ok(UserSpec::new(user.name.clone(), user.weight, Arc::new(target)))
}

/// The coordinator only needs names and weights to split counts.
fn remote_registry(users: &[UserConfig]) -> AppResult<SpecRegistry> {
    if users.is_empty() {
        return Err(AppError::validation(ValidationError::NoUserSpecs));
    }
    let specs = users
        .iter()
        .map(|user| UserSpec::new(user.name.clone(), user.weight, Arc::new(RemoteOnly)));
    Ok(SpecRegistry::new(specs)?)
}
