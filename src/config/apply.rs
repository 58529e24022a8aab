use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{
    CoordinatorArgs, HatcheryArgs, LoadArgs, PositiveU64, PositiveUsize, RoleCommand, TargetArgs,
    WorkerArgs,
};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, CoordinatorConfig, LoadConfig, TargetConfig, WorkerConfig};

/// Applies configuration values to CLI arguments. Values given on the command
/// line win; config values replace clap defaults.
///
/// # Errors
///
/// Returns an error when a config value is out of range.
pub fn apply_config(
    args: &mut HatcheryArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    let Some((_, role_matches)) = matches.subcommand() else {
        return Ok(());
    };

    match &mut args.command {
        RoleCommand::Local(local) => {
            if let Some(load) = config.load.as_ref() {
                apply_load(&mut local.load, role_matches, load)?;
            }
            if let Some(target) = config.target.as_ref() {
                apply_target(&mut local.target, role_matches, target)?;
            }
        }
        RoleCommand::Coordinator(coordinator) => {
            if let Some(load) = config.load.as_ref() {
                apply_load(&mut coordinator.load, role_matches, load)?;
            }
            if let Some(section) = config.coordinator.as_ref() {
                apply_coordinator(coordinator, role_matches, section)?;
            }
        }
        RoleCommand::Worker(worker) => {
            if let Some(target) = config.target.as_ref() {
                apply_target(&mut worker.target, role_matches, target)?;
            }
            if let Some(section) = config.worker.as_ref() {
                apply_worker(worker, role_matches, section)?;
            }
        }
    }
    Ok(())
}

fn apply_load(args: &mut LoadArgs, matches: &ArgMatches, config: &LoadConfig) -> AppResult<()> {
    if !is_cli(matches, "users")
        && let Some(users) = config.users.clone()
    {
        args.users = users;
    }

    if !is_cli(matches, "hatch_rate")
        && let Some(rate) = config.hatch_rate.clone()
    {
        args.hatch_rate = rate;
    }

    if !is_cli(matches, "run_time")
        && let Some(run_time) = config.run_time.as_ref()
    {
        args.run_time = Some(run_time.to_duration("load.run_time")?);
    }

    if !is_cli(matches, "print_interval")
        && let Some(interval) = config.print_interval.as_ref()
    {
        args.print_interval = interval.to_duration("load.print_interval")?;
    }

    Ok(())
}

fn apply_target(
    args: &mut TargetArgs,
    matches: &ArgMatches,
    config: &TargetConfig,
) -> AppResult<()> {
    if !is_cli(matches, "host")
        && let Some(host) = config.host.clone()
    {
        args.host = Some(host);
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.request_timeout = timeout.to_duration("target.timeout")?;
    }

    if !is_cli(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = timeout.to_duration("target.connect_timeout")?;
    }

    if !is_cli(matches, "stop_on_failure")
        && let Some(stop) = config.stop_on_failure
    {
        args.stop_on_failure = stop;
    }

    Ok(())
}

fn apply_coordinator(
    args: &mut CoordinatorArgs,
    matches: &ArgMatches,
    config: &CoordinatorConfig,
) -> AppResult<()> {
    if !is_cli(matches, "listen")
        && let Some(listen) = config.listen.clone()
    {
        args.listen = listen;
    }

    if !is_cli(matches, "expect_workers")
        && let Some(expect) = config.expect_workers
    {
        args.expect_workers = PositiveUsize::try_from(expect).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "coordinator.expect_workers",
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "expect_workers_timeout")
        && let Some(timeout) = config.expect_workers_timeout.as_ref()
    {
        args.expect_workers_timeout = timeout.to_duration("coordinator.expect_workers_timeout")?;
    }

    if !is_cli(matches, "heartbeat_timeout")
        && let Some(timeout) = config.heartbeat_timeout.as_ref()
    {
        args.heartbeat_timeout = timeout.to_duration("coordinator.heartbeat_timeout")?;
    }

    Ok(())
}

fn apply_worker(args: &mut WorkerArgs, matches: &ArgMatches, config: &WorkerConfig) -> AppResult<()> {
    if !is_cli(matches, "join")
        && let Some(join) = config.join.clone()
    {
        args.join = Some(join);
    }

    if !is_cli(matches, "node_id")
        && let Some(node_id) = config.node_id.clone()
    {
        args.node_id = Some(node_id);
    }

    if !is_cli(matches, "report_interval")
        && let Some(interval) = config.report_interval.as_ref()
    {
        args.report_interval = interval.to_duration("worker.report_interval")?;
    }

    if !is_cli(matches, "heartbeat_interval")
        && let Some(interval) = config.heartbeat_interval.as_ref()
    {
        args.heartbeat_interval = interval.to_duration("worker.heartbeat_interval")?;
    }

    if !is_cli(matches, "connect_retries")
        && let Some(retries) = config.connect_retries
    {
        args.connect_retries = PositiveU64::try_from(retries).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "worker.connect_retries",
                source: err,
            })
        })?;
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}
