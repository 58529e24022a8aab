use std::time::Duration;

use tokio::time::Instant;

use crate::runner::RunnerState;

/// Coordinator-side view of one connected worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub id: String,
    pub state: RunnerState,
    pub reported_user_count: u64,
    pub last_report_time: Instant,
}

/// Known workers in connection order.
#[derive(Debug, Clone, Default)]
pub struct WorkerTable {
    records: Vec<WorkerRecord>,
}

impl WorkerTable {
    /// Registers `id` as ready. A worker that registers again keeps its
    /// position but starts over.
    pub fn insert(&mut self, id: &str, now: Instant) {
        let record = WorkerRecord {
            id: id.to_owned(),
            state: RunnerState::Ready,
            reported_user_count: 0,
            last_report_time: now,
        };
        match self.get_mut(id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<WorkerRecord> {
        let position = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(position))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WorkerRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut WorkerRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorkerRecord> {
        self.records.iter_mut()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|record| record.id.clone()).collect()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn user_count(&self) -> u64 {
        self.records
            .iter()
            .fold(0u64, |acc, record| acc.saturating_add(record.reported_user_count))
    }

    /// Removes and returns the workers not heard from within `timeout`.
    pub fn reap(&mut self, now: Instant, timeout: Duration) -> Vec<WorkerRecord> {
        let (silent, alive): (Vec<_>, Vec<_>) = self
            .records
            .drain(..)
            .partition(|record| now.saturating_duration_since(record.last_report_time) > timeout);
        self.records = alive;
        silent
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
