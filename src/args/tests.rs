use super::*;
use crate::args::parsers::parse_hatch_rate;
use crate::error::{AppError, AppResult};
use crate::hatch::{HatchRate, Population};
use clap::Parser;
use std::time::Duration;

#[test]
fn parse_local_defaults() -> AppResult<()> {
    let args = HatcheryArgs::try_parse_from(["hatchery", "local", "--host", "http://localhost"])?;
    let local = match args.command {
        RoleCommand::Local(local) => local,
        RoleCommand::Coordinator(_) | RoleCommand::Worker(_) => {
            return Err(AppError::validation("Expected local subcommand"));
        }
    };

    let checks = [
        (
            local.load.users == Population::Total(1),
            "Unexpected default users",
        ),
        (
            matches!(local.load.hatch_rate, HatchRate::Uniform(rate) if (rate - 1.0).abs() < f64::EPSILON),
            "Unexpected default hatch rate",
        ),
        (local.load.run_time.is_none(), "Expected no run time"),
        (
            local.load.print_interval == Duration::from_secs(5),
            "Unexpected print interval",
        ),
        (
            local.target.host.as_deref() == Some("http://localhost"),
            "Unexpected host",
        ),
        (
            local.target.request_timeout == Duration::from_secs(10),
            "Unexpected request timeout",
        ),
        (!local.target.stop_on_failure, "Expected failures to be caught"),
        (args.config.is_none(), "Expected no config path"),
        (!args.verbose, "Expected verbose to be off"),
    ];
    for (ok, message) in checks {
        if !ok {
            return Err(AppError::validation(message));
        }
    }
    Ok(())
}

#[test]
fn parse_coordinator_options() -> AppResult<()> {
    let args = HatcheryArgs::try_parse_from([
        "hatchery",
        "--verbose",
        "coordinator",
        "--users",
        "200",
        "--hatch-rate",
        "12.5",
        "--run-time",
        "2m",
        "--listen",
        "127.0.0.1:6000",
        "--expect-workers",
        "4",
        "--heartbeat-timeout",
        "30s",
    ])?;
    if !args.verbose {
        return Err(AppError::validation("Expected global verbose flag"));
    }
    let coordinator = match args.command {
        RoleCommand::Coordinator(coordinator) => coordinator,
        RoleCommand::Local(_) | RoleCommand::Worker(_) => {
            return Err(AppError::validation("Expected coordinator subcommand"));
        }
    };
    if coordinator.load.users != Population::Total(200) {
        return Err(AppError::validation("Unexpected users"));
    }
    if !matches!(coordinator.load.hatch_rate, HatchRate::Uniform(rate) if (rate - 12.5).abs() < f64::EPSILON)
    {
        return Err(AppError::validation("Unexpected hatch rate"));
    }
    if coordinator.load.run_time != Some(Duration::from_secs(120)) {
        return Err(AppError::validation("Unexpected run time"));
    }
    if coordinator.listen != "127.0.0.1:6000" {
        return Err(AppError::validation("Unexpected listen address"));
    }
    if coordinator.expect_workers.get() != 4 {
        return Err(AppError::validation("Unexpected expected workers"));
    }
    if coordinator.heartbeat_timeout != Duration::from_secs(30) {
        return Err(AppError::validation("Unexpected heartbeat timeout"));
    }
    Ok(())
}

#[test]
fn parse_worker_options() -> AppResult<()> {
    let args = HatcheryArgs::try_parse_from([
        "hatchery",
        "worker",
        "--join",
        "10.0.0.5:5557",
        "--node-id",
        "w-1",
        "--report-interval",
        "500ms",
        "--config",
        "load.toml",
    ])?;
    if args.config.as_deref() != Some("load.toml") {
        return Err(AppError::validation("Expected global config path"));
    }
    let worker = match args.command {
        RoleCommand::Worker(worker) => worker,
        RoleCommand::Local(_) | RoleCommand::Coordinator(_) => {
            return Err(AppError::validation("Expected worker subcommand"));
        }
    };
    if worker.join.as_deref() != Some("10.0.0.5:5557") {
        return Err(AppError::validation("Unexpected join address"));
    }
    if worker.node_id.as_deref() != Some("w-1") {
        return Err(AppError::validation("Unexpected node id"));
    }
    if worker.report_interval != Duration::from_millis(500) {
        return Err(AppError::validation("Unexpected report interval"));
    }
    if worker.heartbeat_interval != Duration::from_secs(1) {
        return Err(AppError::validation("Unexpected heartbeat interval"));
    }
    Ok(())
}

#[test]
fn parse_rejects_zero_expected_workers() -> AppResult<()> {
    let result = HatcheryArgs::try_parse_from([
        "hatchery",
        "coordinator",
        "--expect-workers",
        "0",
    ]);
    if result.is_ok() {
        return Err(AppError::validation("Expected zero workers to be rejected"));
    }
    Ok(())
}

#[test]
fn parse_rejects_missing_role() -> AppResult<()> {
    if HatcheryArgs::try_parse_from(["hatchery", "--verbose"]).is_ok() {
        return Err(AppError::validation("Expected a role subcommand to be required"));
    }
    Ok(())
}

#[test]
fn duration_units() -> AppResult<()> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("15", Duration::from_secs(15)),
        ("15s", Duration::from_secs(15)),
        ("3m", Duration::from_secs(180)),
        ("2h", Duration::from_secs(7_200)),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration_arg(input)?;
        if parsed != expected {
            return Err(AppError::validation(format!(
                "Unexpected duration for '{}': {:?}",
                input, parsed
            )));
        }
    }
    Ok(())
}

#[test]
fn duration_rejects_bad_input() -> AppResult<()> {
    for input in ["", "s", "10d", "0ms", "99999999999999999999h"] {
        if parse_duration_arg(input).is_ok() {
            return Err(AppError::validation(format!(
                "Expected '{}' to be rejected",
                input
            )));
        }
    }
    Ok(())
}

#[test]
fn hatch_rate_must_be_positive_and_finite() -> AppResult<()> {
    let rate = parse_hatch_rate("0.5")?;
    if !matches!(rate, HatchRate::Uniform(value) if (value - 0.5).abs() < f64::EPSILON) {
        return Err(AppError::validation("Unexpected fractional rate"));
    }
    for input in ["0", "-1", "inf", "NaN", "fast"] {
        if parse_hatch_rate(input).is_ok() {
            return Err(AppError::validation(format!(
                "Expected rate '{}' to be rejected",
                input
            )));
        }
    }
    Ok(())
}

#[test]
fn users_must_not_be_negative() -> AppResult<()> {
    if HatcheryArgs::try_parse_from(["hatchery", "local", "--users", "-3"]).is_ok() {
        return Err(AppError::validation("Expected negative users to be rejected"));
    }
    Ok(())
}

#[test]
fn http_method_labels() -> AppResult<()> {
    if HttpMethod::default().as_str() != "GET" || HttpMethod::Post.as_str() != "POST" {
        return Err(AppError::validation("Unexpected method label"));
    }
    Ok(())
}

#[test]
fn default_node_ids_are_unique() -> AppResult<()> {
    let first = default_node_id();
    let second = default_node_id();
    if first == second {
        return Err(AppError::validation(format!(
            "Expected distinct node ids, got '{}' twice",
            first
        )));
    }
    Ok(())
}
