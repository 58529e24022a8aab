use super::{BehaviorError, ConfigError, DistributedError, ValidationError};

impl From<&'static str> for ValidationError {
    fn from(message: &'static str) -> Self {
        ValidationError::TestExpectation { message }
    }
}

impl From<String> for ValidationError {
    fn from(value: String) -> Self {
        ValidationError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for ConfigError {
    fn from(message: &'static str) -> Self {
        ConfigError::TestExpectation { message }
    }
}

impl From<String> for ConfigError {
    fn from(value: String) -> Self {
        ConfigError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for DistributedError {
    fn from(message: &'static str) -> Self {
        DistributedError::TestExpectation { message }
    }
}

impl From<String> for DistributedError {
    fn from(value: String) -> Self {
        DistributedError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for BehaviorError {
    fn from(message: &'static str) -> Self {
        BehaviorError::TestExpectation { message }
    }
}

impl From<String> for BehaviorError {
    fn from(value: String) -> Self {
        BehaviorError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}
