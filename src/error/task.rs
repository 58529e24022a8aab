use std::fmt::Write as _;

use thiserror::Error;

/// A failure raised while a virtual user executed one of its actions.
///
/// `class` and `trace` together form the deduplication signature used by the
/// exception store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct TaskFailure {
    pub class: String,
    pub message: String,
    pub trace: String,
}

impl TaskFailure {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        let class = class.into();
        let message = message.into();
        let trace = format!("{}: {}", class, message);
        Self {
            class,
            message,
            trace,
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }

    /// Builds a failure from any error value, using the short type name as the
    /// class and the rendered source chain as the trace.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error,
    {
        let full_name = std::any::type_name::<E>();
        let class = full_name.rsplit("::").next().unwrap_or(full_name);
        let mut trace = format!("{}: {}", class, err);
        let mut source = err.source();
        while let Some(cause) = source {
            if write!(trace, "\ncaused by: {}", cause).is_err() {
                break;
            }
            source = cause.source();
        }
        Self {
            class: class.to_owned(),
            message: err.to_string(),
            trace,
        }
    }
}

/// Outcome of a single virtual-user action that did not complete normally.
///
/// `Interrupt` is control flow, not a failure: it ends the innermost behavior
/// scope and must be caught by an enclosing one.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Failure(#[from] TaskFailure),
    #[error("Behavior scope interrupted.")]
    Interrupt,
    #[error("Virtual user stopped itself.")]
    Stop,
}

/// Errors a virtual user surfaces to its runner when it can no longer run.
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Unhandled failure in user '{spec}': {failure}")]
    Failure { spec: String, failure: TaskFailure },
    #[error("User '{spec}' raised an interrupt with no enclosing scope to catch it.")]
    UncaughtInterrupt { spec: String },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}

impl BehaviorError {
    #[must_use]
    pub fn spec(&self) -> &str {
        match self {
            BehaviorError::Failure { spec, .. } | BehaviorError::UncaughtInterrupt { spec } => spec,
            #[cfg(test)]
            BehaviorError::TestExpectation { .. } | BehaviorError::TestExpectationValue { .. } => {
                ""
            }
        }
    }

    /// Converts the error into the failure record reported to the coordinator.
    #[must_use]
    pub fn to_failure(&self) -> TaskFailure {
        match self {
            BehaviorError::Failure { failure, .. } => failure.clone(),
            BehaviorError::UncaughtInterrupt { spec } => TaskFailure::new(
                "UncaughtInterrupt",
                format!("interrupt raised at the top level of user '{}'", spec),
            ),
            #[cfg(test)]
            BehaviorError::TestExpectation { .. } | BehaviorError::TestExpectationValue { .. } => {
                TaskFailure::new("TestExpectation", self.to_string())
            }
        }
    }
}
