use std::collections::BTreeMap;

use super::targets::Targets;

/// Operations needed to move from the live population to the targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HatchPlan {
    pub spawns: BTreeMap<String, u64>,
    pub stops: BTreeMap<String, u64>,
}

impl HatchPlan {
    #[must_use]
    pub fn total_spawns(&self) -> u64 {
        self.spawns
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    #[must_use]
    pub fn total_stops(&self) -> u64 {
        self.stops
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }
}

/// Compares live counts with targets. Specs live but not targeted are
/// stopped entirely.
#[must_use]
pub fn plan(current: &BTreeMap<String, u64>, targets: &Targets) -> HatchPlan {
    let mut result = HatchPlan::default();
    for (name, target) in targets {
        let live = current.get(name).copied().unwrap_or(0);
        if *target > live {
            result
                .spawns
                .insert(name.clone(), target.saturating_sub(live));
        } else if live > *target {
            result.stops.insert(name.clone(), live.saturating_sub(*target));
        }
    }
    for (name, live) in current {
        if *live > 0 && !targets.contains_key(name) {
            result.stops.insert(name.clone(), *live);
        }
    }
    result
}
