//! Hatch scheduler: turns a requested population and rate into paced spawns
//! and immediate stops.
mod hatcher;
mod plan;
mod pool;
mod split;
mod targets;


pub use hatcher::Hatcher;
pub use plan::{HatchPlan, plan};
pub use pool::UserPool;
pub use split::{split_total, weighted_counts};
pub use targets::{
    HatchRate, Population, Rates, Targets, proportional_targets, resolve_population,
    resolve_rates,
};
