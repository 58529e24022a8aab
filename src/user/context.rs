use std::sync::Arc;

use crate::exceptions::ExceptionsHandle;
use crate::stats::StatsHandle;

/// What a running virtual user can see of its runner.
#[derive(Debug, Clone)]
pub struct UserContext {
    spec: Arc<str>,
    stats: StatsHandle,
    exceptions: ExceptionsHandle,
    catch_failures: bool,
}

impl UserContext {
    #[must_use]
    pub fn new(spec: &str, stats: StatsHandle, exceptions: ExceptionsHandle) -> Self {
        Self {
            spec: Arc::from(spec),
            stats,
            exceptions,
            catch_failures: true,
        }
    }

    /// When disabled, the first failure ends the user and is returned to the
    /// runner instead of being swallowed.
    #[must_use]
    pub const fn with_catch_failures(mut self, catch_failures: bool) -> Self {
        self.catch_failures = catch_failures;
        self
    }

    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    #[must_use]
    pub const fn catch_failures(&self) -> bool {
        self.catch_failures
    }

    #[must_use]
    pub const fn stats(&self) -> &StatsHandle {
        &self.stats
    }

    #[must_use]
    pub const fn exceptions(&self) -> &ExceptionsHandle {
        &self.exceptions
    }

    pub fn log_success(&self, method: &str, name: &str, response_time: u64, content_length: u64) {
        self.stats
            .log_request(method, name, response_time, content_length);
    }

    pub fn log_failure(&self, method: &str, name: &str, response_time: u64, error: &str) {
        self.stats.log_failure(method, name, response_time, error);
    }
}
