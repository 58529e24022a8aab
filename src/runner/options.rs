use std::time::Duration;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by runners that execute virtual users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Record user failures and keep the user running.
    pub catch_failures: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            catch_failures: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Workers silent for longer than this are dropped.
    pub heartbeat_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    pub node_id: String,
    pub report_interval: Duration,
    pub heartbeat_interval: Duration,
    pub runner: RunnerOptions,
}

impl WorkerOptions {
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            runner: RunnerOptions::default(),
        }
    }
}
