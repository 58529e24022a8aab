use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid hatch rate '{value}': {source}")]
    InvalidRateNumber {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("Target for user spec '{spec}' must not be negative (got {value}).")]
    NegativeTarget { spec: String, value: i64 },
    #[error("Total population must not be negative (got {value}).")]
    NegativePopulation { value: i64 },
    #[error("Unknown user spec '{name}'.")]
    UnknownUserSpec { name: String },
    #[error("Duplicate user spec '{name}'.")]
    DuplicateUserSpec { name: String },
    #[error("User spec '{name}' must have a weight >= 1.")]
    ZeroWeight { name: String },
    #[error("Hatch rate for '{spec}' must be a finite number > 0 (got {value}).")]
    InvalidHatchRate { spec: String, value: f64 },
    #[error("No hatch rate configured for user spec '{spec}'.")]
    MissingHatchRate { spec: String },
    #[error("No user specs configured (add at least one [[users]] entry).")]
    NoUserSpecs,
    #[error("Missing target host (set --host or [target] host in config).")]
    MissingHost,
    #[error("Missing coordinator address (set --join or [worker] join in config).")]
    MissingJoin,
    #[error("min_wait ({min_ms}ms) must not exceed max_wait ({max_ms}ms) for '{name}'.")]
    WaitRangeInverted {
        name: String,
        min_ms: u64,
        max_ms: u64,
    },
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
