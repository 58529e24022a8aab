//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{CoordinatorArgs, HatcheryArgs, LoadArgs, LocalArgs, RoleCommand, TargetArgs, WorkerArgs};
pub use types::{HttpMethod, PositiveU64, PositiveUsize};

pub(crate) use defaults::{DEFAULT_USER_AGENT, default_node_id};
pub use parsers::parse_duration_arg;
