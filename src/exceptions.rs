//! Deduplicated store of virtual-user failures.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TaskFailure;

/// Serialized exception record, as carried in `stats` and `exception`
/// envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionReport {
    pub class: String,
    pub message: String,
    pub trace: String,
    pub count: u64,
    #[serde(default)]
    pub nodes: BTreeSet<String>,
}

/// Dedup key for a failure: hex SHA-256 over class name and trace text.
#[must_use]
pub fn signature(class: &str, trace: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(class.as_bytes());
    hasher.update(b"\n");
    hasher.update(trace.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len().saturating_mul(2));
    for byte in digest {
        if write!(hex, "{:02x}", byte).is_err() {
            break;
        }
    }
    hex
}

#[derive(Debug, Clone, Default)]
pub struct ExceptionStore {
    records: BTreeMap<String, ExceptionReport>,
}

impl ExceptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `failure`, optionally attributed to a node.
    pub fn record(&mut self, failure: &TaskFailure, node_id: Option<&str>) {
        self.add(
            &failure.class,
            &failure.message,
            &failure.trace,
            1,
            node_id.into_iter(),
        );
    }

    fn add<'node, I>(&mut self, class: &str, message: &str, trace: &str, count: u64, nodes: I)
    where
        I: Iterator<Item = &'node str>,
    {
        let record = self
            .records
            .entry(signature(class, trace))
            .or_insert_with(|| ExceptionReport {
                class: class.to_owned(),
                message: message.to_owned(),
                trace: trace.to_owned(),
                count: 0,
                nodes: BTreeSet::new(),
            });
        record.count = record.count.saturating_add(count);
        record.nodes.extend(nodes.map(str::to_owned));
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<ExceptionReport> {
        self.records.values().cloned().collect()
    }

    /// Adds remote records by signature; `node_id` joins each record's
    /// reporting set.
    pub fn merge(&mut self, reports: &[ExceptionReport], node_id: Option<&str>) {
        for report in reports {
            self.add(
                &report.class,
                &report.message,
                &report.trace,
                report.count,
                report.nodes.iter().map(String::as_str).chain(node_id),
            );
        }
    }

    /// Serializes and clears in one step.
    pub fn take(&mut self) -> Vec<ExceptionReport> {
        let reports = self.serialize();
        self.records.clear();
        reports
    }

    #[must_use]
    pub fn get(&self, signature: &str) -> Option<&ExceptionReport> {
        self.records.get(signature)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExceptionReport> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Shared handle to an [`ExceptionStore`]. Recording never fails.
#[derive(Debug, Clone, Default)]
pub struct ExceptionsHandle {
    inner: Arc<Mutex<ExceptionStore>>,
}

impl ExceptionsHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, failure: &TaskFailure, node_id: Option<&str>) {
        self.write(|store| store.record(failure, node_id));
    }

    pub fn merge(&self, reports: &[ExceptionReport], node_id: Option<&str>) {
        self.write(|store| store.merge(reports, node_id));
    }

    #[must_use]
    pub fn take(&self) -> Vec<ExceptionReport> {
        self.write(ExceptionStore::take)
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<ExceptionReport> {
        self.read(ExceptionStore::serialize)
    }

    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&ExceptionStore) -> T,
    {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut ExceptionStore) -> T,
    {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
