//! Runner lifecycle and the in-process runner.
//!
//! The coordinator and worker roles live in [`crate::distributed`]; they share
//! [`RunnerState`] and the option types defined here.
mod local;
mod options;
mod state;

pub use local::LocalRunner;
pub use options::{
    CoordinatorOptions, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT,
    DEFAULT_REPORT_INTERVAL, RunnerOptions, WorkerOptions,
};
pub use state::{RunnerState, StateCell};
