//! Virtual users shipped with the `hatchery` binary.
mod http;
mod remote;

pub use http::{HttpTarget, HttpUser, build_client};
pub use remote::RemoteOnly;
