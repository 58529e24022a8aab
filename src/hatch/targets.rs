use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::user::SpecRegistry;

use super::split::{split_total, weighted_counts};

/// Resolved per-spec user counts. Always holds every registered spec.
pub type Targets = BTreeMap<String, u64>;
/// Resolved per-spec spawn rates (users per second).
pub type Rates = BTreeMap<String, f64>;

/// Requested population: one total split by weight, or explicit per-spec
/// counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Population {
    Total(i64),
    PerSpec(BTreeMap<String, i64>),
}

impl From<u64> for Population {
    fn from(value: u64) -> Self {
        Population::Total(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Requested spawn rate: one rate split evenly across specs, or explicit
/// per-spec rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HatchRate {
    Uniform(f64),
    PerSpec(BTreeMap<String, f64>),
}

impl From<f64> for HatchRate {
    fn from(value: f64) -> Self {
        HatchRate::Uniform(value)
    }
}

/// Resolves `population` against the registry.
///
/// # Errors
///
/// Rejects negative totals or counts and names that are not registered.
pub fn resolve_population(
    registry: &SpecRegistry,
    population: &Population,
) -> Result<Targets, ValidationError> {
    match population {
        Population::Total(total) => {
            let total = u64::try_from(*total)
                .map_err(|_err| ValidationError::NegativePopulation { value: *total })?;
            Ok(weighted_counts(registry, total))
        }
        Population::PerSpec(counts) => {
            let mut targets: Targets = registry.names().map(|name| (name.to_owned(), 0)).collect();
            for (name, count) in counts {
                let slot = targets
                    .get_mut(name)
                    .ok_or_else(|| ValidationError::UnknownUserSpec { name: name.clone() })?;
                *slot = u64::try_from(*count).map_err(|_err| ValidationError::NegativeTarget {
                    spec: name.clone(),
                    value: *count,
                })?;
            }
            Ok(targets)
        }
    }
}

fn check_rate(spec: &str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidHatchRate {
            spec: spec.to_owned(),
            value,
        })
    }
}

/// Resolves `rate` against the registry. A uniform rate is divided evenly
/// between the specs; specs absent from an explicit mapping get no rate.
///
/// # Errors
///
/// Rejects non-finite or non-positive rates and unknown names.
pub fn resolve_rates(registry: &SpecRegistry, rate: &HatchRate) -> Result<Rates, ValidationError> {
    match rate {
        HatchRate::Uniform(value) => {
            let value = check_rate("*", *value)?;
            let per_spec = value / registry.len().max(1) as f64;
            Ok(registry
                .names()
                .map(|name| (name.to_owned(), per_spec))
                .collect())
        }
        HatchRate::PerSpec(rates) => {
            let mut resolved = Rates::new();
            for (name, value) in rates {
                if !registry.contains(name) {
                    return Err(ValidationError::UnknownUserSpec { name: name.clone() });
                }
                resolved.insert(name.clone(), check_rate(name, *value)?);
            }
            Ok(resolved)
        }
    }
}

/// Spreads a new total over the specs in proportion to `current`, or by spec
/// weight when every current target is zero.
#[must_use]
pub fn proportional_targets(registry: &SpecRegistry, current: &Targets, total: u64) -> Targets {
    let weights: Vec<u64> = registry
        .names()
        .map(|name| current.get(name).copied().unwrap_or(0))
        .collect();
    if weights.iter().all(|weight| *weight == 0) {
        return weighted_counts(registry, total);
    }
    registry
        .names()
        .map(str::to_owned)
        .zip(split_total(total, &weights))
        .collect()
}
