use super::{
    apply_config, load_config_file,
    types::{ConfigFile, DurationValue},
};
use clap::{CommandFactory, FromArgMatches};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::tempdir;

use crate::args::{HatcheryArgs, HttpMethod, RoleCommand};
use crate::hatch::{HatchRate, Population};

const SAMPLE_TOML: &str = r#"
[load]
users = 40
hatch_rate = 4
run_time = "5m"

[coordinator]
listen = "127.0.0.1:7000"
expect_workers = 3
heartbeat_timeout = 20

[worker]
join = "127.0.0.1:7000"
report_interval = "1500ms"

[target]
host = "http://localhost:8080"
timeout = "2s"

[[users]]
name = "browse"
weight = 3
path = "/items"
min_wait = 100
max_wait = 500

[[users]]
name = "checkout"
method = "post"
path = "/cart"
"#;

fn parse_with_config(argv: &[&str], config: &ConfigFile) -> Result<HatcheryArgs, String> {
    let matches = HatcheryArgs::command()
        .try_get_matches_from(argv)
        .map_err(|err| format!("parse failed: {}", err))?;
    let mut args = HatcheryArgs::from_arg_matches(&matches)
        .map_err(|err| format!("from matches failed: {}", err))?;
    apply_config(&mut args, &matches, config).map_err(|err| format!("apply failed: {}", err))?;
    Ok(args)
}

fn load_sample() -> Result<ConfigFile, String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("hatchery.toml");
    std::fs::write(&path, SAMPLE_TOML).map_err(|err| format!("write failed: {}", err))?;
    load_config_file(&path).map_err(|err| format!("load failed: {}", err))
}

#[test]
fn parse_toml_config_sections() -> Result<(), String> {
    let config = load_sample()?;

    let load = config.load.as_ref().ok_or("Expected [load]")?;
    if load.users != Some(Population::Total(40)) {
        return Err(format!("Unexpected users: {:?}", load.users));
    }
    let coordinator = config.coordinator.as_ref().ok_or("Expected [coordinator]")?;
    if coordinator.expect_workers != Some(3) {
        return Err("Unexpected expect_workers".to_owned());
    }
    if config.users.len() != 2 {
        return Err(format!("Expected 2 user specs, got {}", config.users.len()));
    }
    let checkout = config.users.get(1).ok_or("Missing checkout spec")?;
    if checkout.weight != 1 || checkout.method != HttpMethod::Post || checkout.path != "/cart" {
        return Err(format!("Unexpected checkout defaults: {:?}", checkout));
    }
    if checkout.wait_range() != (Duration::ZERO, Duration::ZERO) {
        return Err("Expected zero wait for checkout".to_owned());
    }
    let browse = config.users.first().ok_or("Missing browse spec")?;
    if browse.wait_range() != (Duration::from_millis(100), Duration::from_millis(500)) {
        return Err("Unexpected browse wait range".to_owned());
    }
    Ok(())
}

#[test]
fn parse_json_config_with_per_spec_population() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("hatchery.json");
    let content = r#"{
        "load": { "users": { "browse": 10, "checkout": 2 }, "hatch_rate": { "browse": 5.0, "checkout": 0.5 } },
        "users": [ { "name": "browse" }, { "name": "checkout", "weight": 2 } ]
    }"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_file(&path).map_err(|err| format!("load failed: {}", err))?;
    let load = config.load.ok_or("Expected load")?;
    let expected_users = BTreeMap::from([("browse".to_owned(), 10), ("checkout".to_owned(), 2)]);
    if load.users != Some(Population::PerSpec(expected_users)) {
        return Err(format!("Unexpected users: {:?}", load.users));
    }
    match load.hatch_rate {
        Some(HatchRate::PerSpec(rates)) if rates.len() == 2 => Ok(()),
        other => Err(format!("Unexpected hatch rate: {:?}", other)),
    }
}

#[test]
fn config_fills_values_not_given_on_cli() -> Result<(), String> {
    let config = load_sample()?;
    let args = parse_with_config(&["hatchery", "coordinator", "--users", "7"], &config)?;
    let RoleCommand::Coordinator(coordinator) = args.command else {
        return Err("Expected coordinator".to_owned());
    };
    if coordinator.load.users != Population::Total(7) {
        return Err("CLI users should win over config".to_owned());
    }
    if !matches!(coordinator.load.hatch_rate, HatchRate::Uniform(rate) if (rate - 4.0).abs() < f64::EPSILON)
    {
        return Err(format!(
            "Expected config hatch rate, got {:?}",
            coordinator.load.hatch_rate
        ));
    }
    if coordinator.load.run_time != Some(Duration::from_secs(300)) {
        return Err("Expected config run time".to_owned());
    }
    if coordinator.listen != "127.0.0.1:7000" || coordinator.expect_workers.get() != 3 {
        return Err("Expected coordinator section to apply".to_owned());
    }
    if coordinator.heartbeat_timeout != Duration::from_secs(20) {
        return Err("Expected numeric heartbeat timeout in seconds".to_owned());
    }
    Ok(())
}

#[test]
fn worker_takes_target_and_worker_sections() -> Result<(), String> {
    let config = load_sample()?;
    let args = parse_with_config(&["hatchery", "worker", "--timeout", "9s"], &config)?;
    let RoleCommand::Worker(worker) = args.command else {
        return Err("Expected worker".to_owned());
    };
    if worker.join.as_deref() != Some("127.0.0.1:7000") {
        return Err("Expected join from config".to_owned());
    }
    if worker.report_interval != Duration::from_millis(1500) {
        return Err("Expected report interval from config".to_owned());
    }
    if worker.target.host.as_deref() != Some("http://localhost:8080") {
        return Err("Expected host from config".to_owned());
    }
    if worker.target.request_timeout != Duration::from_secs(9) {
        return Err("CLI timeout should win over config".to_owned());
    }
    Ok(())
}

#[test]
fn zero_expected_workers_in_config_is_rejected() -> Result<(), String> {
    let config: ConfigFile = toml::from_str("[coordinator]\nexpect_workers = 0\n")
        .map_err(|err| format!("parse failed: {}", err))?;
    if parse_with_config(&["hatchery", "coordinator"], &config).is_ok() {
        return Err("Expected zero expect_workers to be rejected".to_owned());
    }
    Ok(())
}

#[test]
fn duration_values_reject_zero() -> Result<(), String> {
    if DurationValue::Seconds(0).to_duration("load.run_time").is_ok() {
        return Err("Expected zero seconds to be rejected".to_owned());
    }
    if DurationValue::Text("0ms".to_owned())
        .to_duration("load.run_time")
        .is_ok()
    {
        return Err("Expected 0ms to be rejected".to_owned());
    }
    let parsed = DurationValue::Text("90s".to_owned())
        .to_duration("load.run_time")
        .map_err(|err| err.to_string())?;
    if parsed != Duration::from_secs(90) {
        return Err("Unexpected parsed duration".to_owned());
    }
    Ok(())
}

#[test]
fn unsupported_extension_is_rejected() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("hatchery.yaml");
    std::fs::write(&path, "load: {}").map_err(|err| format!("write failed: {}", err))?;
    if load_config_file(&path).is_ok() {
        return Err("Expected .yaml to be rejected".to_owned());
    }
    Ok(())
}
