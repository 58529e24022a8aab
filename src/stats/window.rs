use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use super::histogram::percentile_of;

/// Trailing window used for "current" percentiles.
pub const CURRENT_WINDOW: Duration = Duration::from_secs(10);

const MAX_SAMPLES: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    response_time: u64,
    occurrences: u64,
}

/// Time-ordered log of recent response-time samples.
///
/// Samples are appended in arrival order; anything older than the window is
/// evicted on append and ignored on query.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    length: Duration,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(CURRENT_WINDOW)
    }
}

impl SampleWindow {
    #[must_use]
    pub fn new(length: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            length,
        }
    }

    pub fn push(&mut self, now: Instant, response_time: u64, occurrences: u64) {
        if occurrences == 0 {
            return;
        }
        self.evict(now);
        if self.samples.len() >= MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            at: now,
            response_time,
            occurrences,
        });
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.at) > self.length {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_live(&self, sample: &Sample, now: Instant) -> bool {
        now.saturating_duration_since(sample.at) <= self.length
    }

    /// Percentile over the samples still inside the window at `now`.
    #[must_use]
    pub fn percentile(&self, now: Instant, percent: f64) -> u64 {
        let mut buckets: BTreeMap<u64, u64> = BTreeMap::new();
        let mut total = 0u64;
        for sample in self.samples.iter().filter(|sample| self.is_live(sample, now)) {
            let slot = buckets.entry(sample.response_time).or_insert(0);
            *slot = slot.saturating_add(sample.occurrences);
            total = total.saturating_add(sample.occurrences);
        }
        percentile_of(buckets, total, percent)
    }

    /// Number of requests observed inside the window at `now`.
    #[must_use]
    pub fn live_count(&self, now: Instant) -> u64 {
        self.samples
            .iter()
            .filter(|sample| self.is_live(sample, now))
            .fold(0u64, |acc, sample| acc.saturating_add(sample.occurrences))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
