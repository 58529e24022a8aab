use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::entry::{StatsEntry, StatsEntryReport};

pub const TOTAL_NAME: &str = "Total";

/// One deduplicated request failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestErrorReport {
    pub method: String,
    pub name: String,
    pub error: String,
    pub occurrences: u64,
}

/// Everything a worker ships per report cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    pub stats: Vec<StatsEntryReport>,
    pub stats_total: StatsEntryReport,
    pub request_errors: Vec<RequestErrorReport>,
}

type EntryKey = (String, String);
type ErrorKey = (String, String, String);

/// The stats engine: one entry per `(method, name)` plus an aggregate total.
#[derive(Debug, Clone)]
pub struct RequestStats {
    entries: BTreeMap<EntryKey, StatsEntry>,
    total: StatsEntry,
    errors: BTreeMap<ErrorKey, u64>,
    start_time: i64,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl RequestStats {
    #[must_use]
    pub fn new() -> Self {
        let start_time = unix_now();
        Self {
            entries: BTreeMap::new(),
            total: StatsEntry::new("", TOTAL_NAME, start_time),
            errors: BTreeMap::new(),
            start_time,
        }
    }

    fn entry_mut(&mut self, method: &str, name: &str) -> &mut StatsEntry {
        let start_time = self.start_time;
        self.entries
            .entry((method.to_owned(), name.to_owned()))
            .or_insert_with(|| StatsEntry::new(method, name, start_time))
    }

    pub fn log_request(&mut self, method: &str, name: &str, response_time: u64, content_length: u64) {
        let now = Instant::now();
        let unix_secs = unix_now();
        self.entry_mut(method, name)
            .log(response_time, content_length, now, unix_secs);
        self.total.log(response_time, content_length, now, unix_secs);
    }

    /// Counts a failed request: it is logged as a request with no content,
    /// its failure counters are bumped and `error` is deduplicated.
    pub fn log_failure(&mut self, method: &str, name: &str, response_time: u64, error: &str) {
        self.log_request(method, name, response_time, 0);
        self.entry_mut(method, name).log_error();
        self.total.log_error();
        let slot = self
            .errors
            .entry((method.to_owned(), name.to_owned(), error.to_owned()))
            .or_insert(0);
        *slot = slot.saturating_add(1);
    }

    #[must_use]
    pub fn get(&self, method: &str, name: &str) -> Option<&StatsEntry> {
        self.entries.get(&(method.to_owned(), name.to_owned()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &StatsEntry> {
        self.entries.values()
    }

    #[must_use]
    pub const fn total(&self) -> &StatsEntry {
        &self.total
    }

    #[must_use]
    pub fn serialize_stats(&self) -> Vec<StatsEntryReport> {
        self.entries
            .values()
            .filter(|entry| entry.num_requests() > 0 || entry.num_failures() > 0)
            .map(StatsEntry::report)
            .collect()
    }

    #[must_use]
    pub fn request_errors(&self) -> Vec<RequestErrorReport> {
        self.errors
            .iter()
            .map(|((method, name, error), occurrences)| RequestErrorReport {
                method: method.clone(),
                name: name.clone(),
                error: error.clone(),
                occurrences: *occurrences,
            })
            .collect()
    }

    #[must_use]
    pub fn report(&self) -> StatsReport {
        StatsReport {
            stats: self.serialize_stats(),
            stats_total: self.total.report(),
            request_errors: self.request_errors(),
        }
    }

    /// Serializes the current state and clears it in one step.
    pub fn take_report(&mut self) -> StatsReport {
        let report = self.report();
        self.clear_all();
        report
    }

    /// Merges a remote report: every entry and the total are extended, and
    /// request errors add by key.
    pub fn merge(&mut self, report: &StatsReport) {
        let now = Instant::now();
        for remote in &report.stats {
            self.entry_mut(&remote.method, &remote.name)
                .extend(remote, now);
        }
        self.total.extend(&report.stats_total, now);
        for remote in &report.request_errors {
            let slot = self
                .errors
                .entry((
                    remote.method.clone(),
                    remote.name.clone(),
                    remote.error.clone(),
                ))
                .or_insert(0);
            *slot = slot.saturating_add(remote.occurrences);
        }
    }

    /// Resets every entry to empty while keeping which keys exist.
    pub fn clear_all(&mut self) {
        self.start_time = unix_now();
        for entry in self.entries.values_mut() {
            entry.reset(self.start_time);
        }
        self.total.reset(self.start_time);
        self.errors.clear();
    }
}
