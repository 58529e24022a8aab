use std::collections::BTreeMap;

use crate::user::SpecRegistry;

/// Splits `total` proportionally to `weights`.
///
/// Each slot gets `floor(weight / total_weight * total)`; the remainder is
/// handed out one unit at a time from the first slot on, so the shares always
/// sum to exactly `total`.
#[must_use]
pub fn split_total(total: u64, weights: &[u64]) -> Vec<u64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total_weight: u128 = weights.iter().map(|value| u128::from(*value)).sum();
    if total_weight == 0 {
        return vec![0; weights.len()];
    }

    let mut shares = vec![0u64; weights.len()];
    let mut remainder = u128::from(total);
    for (slot, weight) in shares.iter_mut().zip(weights) {
        let share = u128::from(total)
            .saturating_mul(u128::from(*weight))
            .checked_div(total_weight)
            .unwrap_or(0);
        *slot = u64::try_from(share).unwrap_or(u64::MAX);
        remainder = remainder.saturating_sub(share);
    }

    let mut idx = 0usize;
    while remainder > 0 {
        if let Some(value) = shares.get_mut(idx) {
            *value = value.saturating_add(1);
        }
        remainder = remainder.saturating_sub(1);
        idx = idx.saturating_add(1);
        if idx >= shares.len() {
            idx = 0;
        }
    }

    shares
}

/// Distributes `total` users across the registered specs by weight.
#[must_use]
pub fn weighted_counts(registry: &SpecRegistry, total: u64) -> BTreeMap<String, u64> {
    let shares = split_total(total, &registry.weights());
    registry
        .names()
        .map(str::to_owned)
        .zip(shares)
        .collect()
}
