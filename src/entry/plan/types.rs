use std::time::Duration;

use crate::args::LoadArgs;
use crate::runner::{CoordinatorOptions, RunnerOptions, WorkerOptions};
use crate::user::SpecRegistry;

pub(in crate::entry) struct LocalPlan {
    pub(super) registry: SpecRegistry,
    pub(super) load: LoadArgs,
    pub(super) options: RunnerOptions,
}

pub(in crate::entry) struct CoordinatorPlan {
    pub(super) registry: SpecRegistry,
    pub(super) load: LoadArgs,
    pub(super) listen: String,
    pub(super) expect_workers: usize,
    pub(super) expect_workers_timeout: Duration,
    pub(super) options: CoordinatorOptions,
}

pub(in crate::entry) struct WorkerPlan {
    pub(super) registry: SpecRegistry,
    pub(super) join: String,
    pub(super) connect_retries: u64,
    pub(super) options: WorkerOptions,
}

pub(in crate::entry) enum RunPlan {
    Local(LocalPlan),
    Coordinator(CoordinatorPlan),
    Worker(WorkerPlan),
}
