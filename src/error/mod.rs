mod app;
mod config;
mod distributed;
mod task;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use distributed::{DistributedError, EnvelopeField};
pub use task::{BehaviorError, TaskError, TaskFailure};
pub use validation::ValidationError;
