use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use super::defaults::DEFAULT_LISTEN;
use super::parsers::{
    parse_duration_arg, parse_hatch_rate, parse_population, parse_positive_u64,
    parse_positive_usize,
};
use super::types::{PositiveU64, PositiveUsize};
use crate::hatch::{HatchRate, Population};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Distributed load generation in Rust - weighted virtual users, coordinator/worker runs, and mergeable response-time statistics."
)]
pub struct HatcheryArgs {
    #[command(subcommand)]
    pub command: RoleCommand,

    /// Path to config file (TOML or JSON). Defaults to hatchery.toml/hatchery.json if present.
    #[arg(long = "config", global = true)]
    pub config: Option<String>,

    /// Enable verbose logging (sets log level to debug unless overridden by HATCHERY_LOG/RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RoleCommand {
    /// Run every virtual user in this process
    Local(LocalArgs),
    /// Distribute virtual users across connected workers
    Coordinator(CoordinatorArgs),
    /// Join a coordinator and run the users it assigns
    Worker(WorkerArgs),
}

#[derive(Debug, Args, Clone)]
pub struct LoadArgs {
    /// Total number of virtual users to converge to
    #[arg(long = "users", short = 'u', default_value = "1", value_parser = parse_population)]
    pub users: Population,

    /// Users spawned per second (fractions allowed)
    #[arg(long = "hatch-rate", short = 'r', default_value = "1", value_parser = parse_hatch_rate)]
    pub hatch_rate: HatchRate,

    /// Stop after this long (supports ms/s/m/h); runs until interrupted when unset
    #[arg(long = "run-time", short = 't', value_parser = parse_duration_arg)]
    pub run_time: Option<Duration>,

    /// Interval between logged stats summaries (supports ms/s/m/h)
    #[arg(long = "print-interval", default_value = "5s", value_parser = parse_duration_arg)]
    pub print_interval: Duration,
}

#[derive(Debug, Args, Clone)]
pub struct TargetArgs {
    /// Base URL the built-in HTTP users send requests to (e.g. http://localhost:8080)
    #[arg(long = "host", short = 'H')]
    pub host: Option<String>,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "10s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Connection timeout (supports ms/s/m/h)
    #[arg(long = "connect-timeout", default_value = "5s", value_parser = parse_duration_arg)]
    pub connect_timeout: Duration,

    /// End a virtual user on its first failure instead of recording it and moving on
    #[arg(long = "stop-on-failure")]
    pub stop_on_failure: bool,
}

#[derive(Debug, Args, Clone)]
pub struct LocalArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CoordinatorArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Address workers connect to
    #[arg(long = "listen", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Number of workers to wait for before hatching
    #[arg(long = "expect-workers", default_value = "1", value_parser = parse_positive_usize)]
    pub expect_workers: PositiveUsize,

    /// Give up waiting for workers after this long (supports ms/s/m/h)
    #[arg(long = "expect-workers-timeout", default_value = "60s", value_parser = parse_duration_arg)]
    pub expect_workers_timeout: Duration,

    /// Drop workers silent for longer than this (supports ms/s/m/h)
    #[arg(long = "heartbeat-timeout", default_value = "10s", value_parser = parse_duration_arg)]
    pub heartbeat_timeout: Duration,
}

#[derive(Debug, Args, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Coordinator address to join (e.g. 10.0.0.5:5557)
    #[arg(long = "join")]
    pub join: Option<String>,

    /// Explicit node id (defaults to host, pid and a random suffix)
    #[arg(long = "node-id")]
    pub node_id: Option<String>,

    /// Interval between stats reports to the coordinator (supports ms/s/m/h)
    #[arg(long = "report-interval", default_value = "3s", value_parser = parse_duration_arg)]
    pub report_interval: Duration,

    /// Interval between heartbeats to the coordinator (supports ms/s/m/h)
    #[arg(long = "heartbeat-interval", default_value = "1s", value_parser = parse_duration_arg)]
    pub heartbeat_interval: Duration,

    /// Reconnect attempts before giving up on the coordinator
    #[arg(long = "connect-retries", default_value = "5", value_parser = parse_positive_u64)]
    pub connect_retries: PositiveU64,
}
