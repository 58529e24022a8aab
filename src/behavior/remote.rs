use async_trait::async_trait;

use crate::error::TaskError;
use crate::user::{Behavior, UserContext, VirtualUser};

/// Behavior for specs a coordinator knows by name and weight but never runs.
///
/// A user created from it stops on its first step.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteOnly;

struct RemoteOnlyUser;

impl Behavior for RemoteOnly {
    fn create(&self) -> Box<dyn VirtualUser> {
        Box::new(RemoteOnlyUser)
    }
}

#[async_trait]
impl VirtualUser for RemoteOnlyUser {
    async fn step(&mut self, _ctx: &UserContext) -> Result<(), TaskError> {
        Err(TaskError::Stop)
    }
}
