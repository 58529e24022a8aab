//! Response-time statistics: per-request entries, an aggregate total, rounded
//! histograms for all-time percentiles and a sliding window for current ones.
mod entry;
mod histogram;
mod request_stats;
mod window;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

pub use entry::{StatsEntry, StatsEntryReport};
pub use histogram::{ResponseTimeHistogram, round_response_time};
pub use request_stats::{RequestErrorReport, RequestStats, StatsReport, TOTAL_NAME};
pub use window::{CURRENT_WINDOW, SampleWindow};

/// Cloneable handle shared by virtual users and the control loop.
///
/// Every operation holds the lock for its whole duration, so a report-and-clear
/// cannot lose a concurrent log.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<RequestStats>>,
}

impl StatsHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_request(&self, method: &str, name: &str, response_time: u64, content_length: u64) {
        self.write(|stats| stats.log_request(method, name, response_time, content_length));
    }

    pub fn log_failure(&self, method: &str, name: &str, response_time: u64, error: &str) {
        self.write(|stats| stats.log_failure(method, name, response_time, error));
    }

    #[must_use]
    pub fn take_report(&self) -> StatsReport {
        self.write(RequestStats::take_report)
    }

    pub fn merge(&self, report: &StatsReport) {
        self.write(|stats| stats.merge(report));
    }

    pub fn clear_all(&self) {
        self.write(RequestStats::clear_all);
    }

    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&RequestStats) -> T,
    {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut RequestStats) -> T,
    {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
