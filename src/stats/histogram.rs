use std::collections::BTreeMap;

/// Rounds a response time (ms) to the bucket it is counted in.
///
/// Below 100 ms values are kept exact; above that they are rounded to two
/// significant digits (nearest 10, 100, then 1000).
#[must_use]
pub const fn round_response_time(response_time: u64) -> u64 {
    let step = if response_time < 100 {
        return response_time;
    } else if response_time < 1_000 {
        10
    } else if response_time < 10_000 {
        100
    } else {
        1_000
    };
    let half = step / 2;
    (response_time.saturating_add(half) / step).saturating_mul(step)
}

/// Walks `buckets` in ascending order and returns the first bucket whose
/// cumulative count exceeds `floor(percent * total)`.
pub(crate) fn percentile_of<I>(buckets: I, total: u64, percent: f64) -> u64
where
    I: IntoIterator<Item = (u64, u64)>,
{
    if total == 0 {
        return 0;
    }
    let percent = percent.clamp(0.0, 1.0);
    let rank = (percent * total as f64).floor() as u64;
    let rank = rank.min(total.saturating_sub(1));
    let mut seen = 0u64;
    let mut last = 0u64;
    for (bucket, count) in buckets {
        seen = seen.saturating_add(count);
        last = bucket;
        if seen > rank {
            return bucket;
        }
    }
    last
}

/// Response-time counts keyed by rounded bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTimeHistogram {
    buckets: BTreeMap<u64, u64>,
    count: u64,
}

impl ResponseTimeHistogram {
    #[must_use]
    pub fn from_buckets(buckets: BTreeMap<u64, u64>) -> Self {
        let count = buckets
            .values()
            .fold(0u64, |acc, value| acc.saturating_add(*value));
        Self { buckets, count }
    }

    pub fn record(&mut self, response_time: u64) {
        self.record_bucket(round_response_time(response_time), 1);
    }

    fn record_bucket(&mut self, bucket: u64, occurrences: u64) {
        if occurrences == 0 {
            return;
        }
        let slot = self.buckets.entry(bucket).or_insert(0);
        *slot = slot.saturating_add(occurrences);
        self.count = self.count.saturating_add(occurrences);
    }

    /// Adds another histogram bucket-wise. Buckets are taken as-is.
    pub fn merge_buckets(&mut self, buckets: &BTreeMap<u64, u64>) {
        for (bucket, occurrences) in buckets {
            self.record_bucket(*bucket, *occurrences);
        }
    }

    #[must_use]
    pub fn percentile(&self, percent: f64) -> u64 {
        percentile_of(
            self.buckets.iter().map(|(bucket, count)| (*bucket, *count)),
            self.count,
            percent,
        )
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn buckets(&self) -> &BTreeMap<u64, u64> {
        &self.buckets
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.count = 0;
    }
}
