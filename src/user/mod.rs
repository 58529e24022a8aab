//! Virtual-user specs and the per-user execution loop.
//!
//! A [`UserSpec`] names a behavior and its relative weight. The runners only
//! ever ask a behavior to [`Behavior::create`] a fresh [`VirtualUser`] and
//! then drive it with [`run_user`]; what a user does inside `step` is opaque.
mod context;
mod run;
mod spec;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TaskError;

pub use context::UserContext;
pub use run::{catch_interrupt, run_user};
pub use spec::{SpecRegistry, UserSpec};

/// Factory for virtual users of one spec.
pub trait Behavior: Send + Sync {
    fn create(&self) -> Box<dyn VirtualUser>;
}

impl<F> Behavior for F
where
    F: Fn() -> Box<dyn VirtualUser> + Send + Sync,
{
    fn create(&self) -> Box<dyn VirtualUser> {
        self()
    }
}

/// One simulated client.
#[async_trait]
pub trait VirtualUser: Send {
    /// Runs one scheduled action.
    ///
    /// # Errors
    ///
    /// `Failure` is recorded and the user moves on, `Interrupt` ends the
    /// current scope, `Stop` ends the user.
    async fn step(&mut self, ctx: &UserContext) -> Result<(), TaskError>;

    /// Pause between two actions.
    fn wait_time(&self) -> Duration {
        Duration::ZERO
    }
}
