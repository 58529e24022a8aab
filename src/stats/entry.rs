use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::histogram::ResponseTimeHistogram;
use super::window::SampleWindow;

/// Seconds excluded from the tail of the rps window; the newest seconds are
/// usually still filling up.
const RPS_TAIL_SECS: i64 = 2;
const RPS_WINDOW_SECS: i64 = 10;

/// Wire form of a [`StatsEntry`]. The sample window is node-local and is not
/// part of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsEntryReport {
    pub method: String,
    pub name: String,
    pub num_requests: u64,
    pub num_failures: u64,
    pub total_response_time: u64,
    pub min_response_time: Option<u64>,
    pub max_response_time: u64,
    pub total_content_length: u64,
    pub response_times: BTreeMap<u64, u64>,
    #[serde(default)]
    pub num_reqs_per_sec: BTreeMap<i64, u64>,
    pub start_time: i64,
    #[serde(default)]
    pub last_request_timestamp: Option<i64>,
}

/// Statistics for one `(method, name)` pair, or the aggregate total.
#[derive(Debug, Clone)]
pub struct StatsEntry {
    method: String,
    name: String,
    num_requests: u64,
    num_failures: u64,
    total_response_time: u64,
    min_response_time: Option<u64>,
    max_response_time: u64,
    total_content_length: u64,
    response_times: ResponseTimeHistogram,
    num_reqs_per_sec: BTreeMap<i64, u64>,
    start_time: i64,
    last_request_timestamp: Option<i64>,
    window: SampleWindow,
}

impl StatsEntry {
    #[must_use]
    pub fn new(method: &str, name: &str, start_time: i64) -> Self {
        Self {
            method: method.to_owned(),
            name: name.to_owned(),
            num_requests: 0,
            num_failures: 0,
            total_response_time: 0,
            min_response_time: None,
            max_response_time: 0,
            total_content_length: 0,
            response_times: ResponseTimeHistogram::default(),
            num_reqs_per_sec: BTreeMap::new(),
            start_time,
            last_request_timestamp: None,
            window: SampleWindow::default(),
        }
    }

    /// Folds one measured request into the entry.
    pub fn log(&mut self, response_time: u64, content_length: u64, now: Instant, unix_secs: i64) {
        self.num_requests = self.num_requests.saturating_add(1);
        self.total_response_time = self.total_response_time.saturating_add(response_time);
        self.min_response_time = Some(
            self.min_response_time
                .map_or(response_time, |min| min.min(response_time)),
        );
        self.max_response_time = self.max_response_time.max(response_time);
        self.total_content_length = self.total_content_length.saturating_add(content_length);
        self.response_times.record(response_time);
        let per_sec = self.num_reqs_per_sec.entry(unix_secs).or_insert(0);
        *per_sec = per_sec.saturating_add(1);
        self.last_request_timestamp = Some(
            self.last_request_timestamp
                .map_or(unix_secs, |last| last.max(unix_secs)),
        );
        self.window.push(now, response_time, 1);
    }

    pub fn log_error(&mut self) {
        self.num_failures = self.num_failures.saturating_add(1);
    }

    /// Merges a remote report into this entry.
    ///
    /// Sums add, min/max combine and histograms merge bucket-wise, so the
    /// result does not depend on the order reports arrive in. The report's
    /// buckets are also added to the local window at `now`.
    pub fn extend(&mut self, report: &StatsEntryReport, now: Instant) {
        self.num_requests = self.num_requests.saturating_add(report.num_requests);
        self.num_failures = self.num_failures.saturating_add(report.num_failures);
        self.total_response_time = self
            .total_response_time
            .saturating_add(report.total_response_time);
        self.min_response_time = match (self.min_response_time, report.min_response_time) {
            (Some(local), Some(remote)) => Some(local.min(remote)),
            (local, remote) => local.or(remote),
        };
        self.max_response_time = self.max_response_time.max(report.max_response_time);
        self.total_content_length = self
            .total_content_length
            .saturating_add(report.total_content_length);
        self.response_times.merge_buckets(&report.response_times);
        for (second, count) in &report.num_reqs_per_sec {
            let slot = self.num_reqs_per_sec.entry(*second).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        self.start_time = self.start_time.min(report.start_time);
        self.last_request_timestamp = match (self.last_request_timestamp, report.last_request_timestamp) {
            (Some(local), Some(remote)) => Some(local.max(remote)),
            (local, remote) => local.or(remote),
        };
        for (bucket, count) in &report.response_times {
            self.window.push(now, *bucket, *count);
        }
    }

    /// Empties the entry while keeping its identity.
    pub fn reset(&mut self, start_time: i64) {
        *self = Self::new(&self.method, &self.name, start_time);
    }

    #[must_use]
    pub fn report(&self) -> StatsEntryReport {
        StatsEntryReport {
            method: self.method.clone(),
            name: self.name.clone(),
            num_requests: self.num_requests,
            num_failures: self.num_failures,
            total_response_time: self.total_response_time,
            min_response_time: self.min_response_time,
            max_response_time: self.max_response_time,
            total_content_length: self.total_content_length,
            response_times: self.response_times.buckets().clone(),
            num_reqs_per_sec: self.num_reqs_per_sec.clone(),
            start_time: self.start_time,
            last_request_timestamp: self.last_request_timestamp,
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn num_requests(&self) -> u64 {
        self.num_requests
    }

    #[must_use]
    pub const fn num_failures(&self) -> u64 {
        self.num_failures
    }

    #[must_use]
    pub const fn min_response_time(&self) -> Option<u64> {
        self.min_response_time
    }

    #[must_use]
    pub const fn max_response_time(&self) -> u64 {
        self.max_response_time
    }

    #[must_use]
    pub fn avg_response_time(&self) -> f64 {
        ratio(self.total_response_time, self.num_requests)
    }

    #[must_use]
    pub fn avg_content_length(&self) -> f64 {
        ratio(self.total_content_length, self.num_requests)
    }

    #[must_use]
    pub fn fail_ratio(&self) -> f64 {
        ratio(self.num_failures, self.num_requests)
    }

    #[must_use]
    pub fn median_response_time(&self) -> u64 {
        self.response_times.percentile(0.5)
    }

    /// Percentile over every request this entry has seen.
    #[must_use]
    pub fn percentile(&self, percent: f64) -> u64 {
        self.response_times.percentile(percent)
    }

    /// Percentile over the samples inside the trailing window only.
    #[must_use]
    pub fn current_response_time_percentile(&self, percent: f64) -> u64 {
        self.window.percentile(Instant::now(), percent)
    }

    /// Average requests per second over the seconds before `now_secs`,
    /// skipping the newest still-filling seconds.
    #[must_use]
    pub fn current_rps(&self, now_secs: i64) -> f64 {
        let Some(last) = self.last_request_timestamp else {
            return 0.0;
        };
        let end = last.min(now_secs).saturating_sub(RPS_TAIL_SECS);
        let start = end.saturating_sub(RPS_WINDOW_SECS).max(self.start_time);
        if end <= start {
            return 0.0;
        }
        let requests = self
            .num_reqs_per_sec
            .range(start..end)
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count));
        requests as f64 / end.saturating_sub(start) as f64
    }

    /// Requests per second across the whole run.
    #[must_use]
    pub fn total_rps(&self) -> f64 {
        let Some(last) = self.last_request_timestamp else {
            return 0.0;
        };
        let elapsed = last.saturating_sub(self.start_time).max(1);
        self.num_requests as f64 / elapsed as f64
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
