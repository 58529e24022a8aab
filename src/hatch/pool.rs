use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::BehaviorError;
use crate::exceptions::ExceptionsHandle;
use crate::stats::StatsHandle;
use crate::user::{UserContext, UserSpec, run_user};

type Handles = BTreeMap<String, Vec<JoinHandle<()>>>;

/// Live virtual-user tasks, grouped by spec.
#[derive(Debug, Clone, Default)]
pub struct UserPool {
    users: Arc<Mutex<Handles>>,
}

impl UserPool {
    fn with_users<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut Handles) -> T,
    {
        let mut guard = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        for handles in guard.values_mut() {
            handles.retain(|handle| !handle.is_finished());
        }
        f(&mut guard)
    }

    pub fn push(&self, spec: &str, handle: JoinHandle<()>) {
        self.with_users(|users| users.entry(spec.to_owned()).or_default().push(handle));
    }

    #[must_use]
    pub fn count(&self, spec: &str) -> u64 {
        self.with_users(|users| users.get(spec).map_or(0, |handles| handles.len() as u64))
    }

    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.with_users(|users| {
            users
                .iter()
                .map(|(name, handles)| (name.clone(), handles.len() as u64))
                .collect()
        })
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.with_users(|users| {
            users
                .values()
                .fold(0u64, |acc, handles| acc.saturating_add(handles.len() as u64))
        })
    }

    /// Aborts the `count` most recently started users of `spec`.
    pub fn stop(&self, spec: &str, count: u64) {
        self.with_users(|users| {
            if let Some(handles) = users.get_mut(spec) {
                for _ in 0..count {
                    match handles.pop() {
                        Some(handle) => handle.abort(),
                        None => break,
                    }
                }
            }
        });
    }

    pub fn stop_all(&self) {
        self.with_users(|users| {
            for handle in users.values_mut().flat_map(|handles| handles.drain(..)) {
                handle.abort();
            }
        });
    }
}

/// Everything needed to start one virtual user.
#[derive(Debug, Clone)]
pub(crate) struct Spawner {
    pub pool: UserPool,
    pub stats: StatsHandle,
    pub exceptions: ExceptionsHandle,
    pub catch_failures: bool,
    pub fatal_tx: mpsc::UnboundedSender<BehaviorError>,
}

impl Spawner {
    pub(crate) fn spawn(&self, spec: &UserSpec) {
        let user = spec.behavior().create();
        let ctx = UserContext::new(spec.name(), self.stats.clone(), self.exceptions.clone())
            .with_catch_failures(self.catch_failures);
        let fatal_tx = self.fatal_tx.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = run_user(user, ctx).await {
                warn!("{}", err);
                if fatal_tx.send(err).is_err() {
                    debug!("Fatal user error dropped: runner is gone");
                }
            }
        });
        self.pool.push(spec.name(), handle);
    }
}
