use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, parse_duration_arg};
use crate::error::{AppError, AppResult, ConfigError};
use crate::hatch::{HatchRate, Population};

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub load: Option<LoadConfig>,
    pub coordinator: Option<CoordinatorConfig>,
    pub worker: Option<WorkerConfig>,
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// `[load]`: population and pacing. `users` and `hatch_rate` take either a
/// single value or a per-spec table.
#[derive(Debug, Default, Deserialize)]
pub struct LoadConfig {
    pub users: Option<Population>,
    pub hatch_rate: Option<HatchRate>,
    pub run_time: Option<DurationValue>,
    pub print_interval: Option<DurationValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoordinatorConfig {
    pub listen: Option<String>,
    pub expect_workers: Option<usize>,
    pub expect_workers_timeout: Option<DurationValue>,
    pub heartbeat_timeout: Option<DurationValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkerConfig {
    pub join: Option<String>,
    pub node_id: Option<String>,
    pub report_interval: Option<DurationValue>,
    pub heartbeat_interval: Option<DurationValue>,
    pub connect_retries: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetConfig {
    pub host: Option<String>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub stop_on_failure: Option<bool>,
}

/// One `[[users]]` entry: a built-in HTTP user spec.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u64,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default = "default_path")]
    pub path: String,
    /// Milliseconds.
    #[serde(default)]
    pub min_wait: u64,
    /// Milliseconds; defaults to `min_wait`.
    pub max_wait: Option<u64>,
}

impl UserConfig {
    #[must_use]
    pub const fn wait_range(&self) -> (Duration, Duration) {
        let max = match self.max_wait {
            Some(max) => max,
            None => self.min_wait,
        };
        (Duration::from_millis(self.min_wait), Duration::from_millis(max))
    }
}

const fn default_weight() -> u64 {
    1
}

fn default_path() -> String {
    "/".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self, field: &'static str) -> AppResult<Duration> {
        match self {
            DurationValue::Seconds(0) => Err(AppError::config(ConfigError::InvalidDuration {
                field,
                message: "Duration must be > 0.".to_owned(),
            })),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration_arg(text).map_err(|err| {
                AppError::config(ConfigError::InvalidDuration {
                    field,
                    message: err.to_string(),
                })
            }),
        }
    }
}
