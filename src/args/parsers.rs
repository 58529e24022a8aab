use std::time::Duration;

use super::types::{PositiveU64, PositiveUsize};
use crate::error::{AppError, AppResult, ValidationError};
use crate::hatch::{HatchRate, Population};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;

pub(super) fn parse_positive_u64(s: &str) -> AppResult<PositiveU64> {
    s.parse::<PositiveU64>().map_err(AppError::from)
}

pub(super) fn parse_positive_usize(s: &str) -> AppResult<PositiveUsize> {
    s.parse::<PositiveUsize>().map_err(AppError::from)
}

/// Parses a total user count.
///
/// # Errors
///
/// Returns an error for malformed or negative numbers.
pub(crate) fn parse_population(s: &str) -> AppResult<Population> {
    let total: i64 = s
        .trim()
        .parse()
        .map_err(|err| AppError::validation(ValidationError::InvalidNumber { source: err }))?;
    if total < 0 {
        return Err(AppError::validation(ValidationError::NegativePopulation {
            value: total,
        }));
    }
    Ok(Population::Total(total))
}

/// Parses a uniform hatch rate in users per second. Fractions are allowed.
///
/// # Errors
///
/// Returns an error for malformed numbers and for values that are not
/// finite and strictly positive.
pub(crate) fn parse_hatch_rate(s: &str) -> AppResult<HatchRate> {
    parse_rate_value(s).map(HatchRate::Uniform)
}

fn parse_rate_value(s: &str) -> AppResult<f64> {
    let value = s.trim();
    let rate: f64 = value.parse().map_err(|err| {
        AppError::validation(ValidationError::InvalidRateNumber {
            value: value.to_owned(),
            source: err,
        })
    })?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::validation(ValidationError::InvalidHatchRate {
            spec: "--hatch-rate".to_owned(),
            value: rate,
        }));
    }
    Ok(rate)
}

/// Parses `<digits>[ms|s|m|h]`; a bare number means seconds.
///
/// # Errors
///
/// Returns an error for empty input, a missing or malformed number, an
/// unknown unit, overflow, or a zero duration.
pub fn parse_duration_arg(s: &str) -> AppResult<Duration> {
    let value = s.trim();
    if value.is_empty() {
        return Err(AppError::validation(ValidationError::DurationEmpty));
    }

    let digits_len = value.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(AppError::validation(
            ValidationError::InvalidDurationFormat {
                value: value.to_owned(),
            },
        ));
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part.parse().map_err(|err| {
        AppError::validation(ValidationError::InvalidDurationNumber {
            value: value.to_owned(),
            source: err,
        })
    })?;

    let duration = match unit_part {
        "ms" => Duration::from_millis(number),
        "" | "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(scaled_secs(number, SECS_PER_MINUTE)?),
        "h" => Duration::from_secs(scaled_secs(number, SECS_PER_HOUR)?),
        unit => {
            return Err(AppError::validation(ValidationError::InvalidDurationUnit {
                unit: unit.to_owned(),
            }));
        }
    };

    if duration.is_zero() {
        return Err(AppError::validation(ValidationError::DurationZero));
    }

    Ok(duration)
}

fn scaled_secs(number: u64, factor: u64) -> AppResult<u64> {
    number
        .checked_mul(factor)
        .ok_or_else(|| AppError::validation(ValidationError::DurationOverflow))
}
